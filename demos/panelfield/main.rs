use gantryline::cli::{execute, Args};
use structopt::StructOpt;

mod layout;

fn main() {
    env_logger::init();
    let args = Args::from_args();
    let (scene, welds) = layout::panel_field();

    if let Err(e) = execute("panelfield", &scene, &welds, args) {
        eprintln!("planning failed: {e}");
        std::process::exit(1);
    }
}
