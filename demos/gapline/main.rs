use gantryline::cli::{execute, Args};
use structopt::StructOpt;

mod layout;

fn main() {
    env_logger::init();
    let args = Args::from_args();
    let (scene, welds) = layout::bracketed_line();

    if let Err(e) = execute("gapline", &scene, &welds, args) {
        eprintln!("planning failed: {e}");
        std::process::exit(1);
    }
}
