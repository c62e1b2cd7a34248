pub mod prelude;

pub mod collision;
pub mod planner;
pub mod queue;
pub mod scene;
pub mod sim;
pub mod utils;

pub use collision::*;
pub use planner::*;
pub use prelude::*;
pub use queue::*;
pub use scene::*;
pub use sim::*;
pub use utils::*;

// only useful for the demo binaries
pub mod cli;
