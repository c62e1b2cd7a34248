//! Shared plumbing for the demo binaries: argument parsing, the report
//! table, and a multi-threaded sweep over the execution modes.

use std::time::Instant;

use parking_lot::Mutex;
use peak_alloc::PeakAlloc;
use structopt::StructOpt;

use crate::{plan, PlanMode, PlanningError, Scene, Simulator, Weld};

#[global_allocator]
static PEAK_ALLOC: PeakAlloc = PeakAlloc;

#[derive(Debug, StructOpt)]
pub enum Args {
    /// Plan the scenario and execute it in one mode.
    Run {
        #[structopt(short, long, default_value = "hybrid")]
        mode: PlanMode,
        #[structopt(short, long, default_value = "0.1")]
        dt: f64,
        /// Simulated-time cap, seconds.
        #[structopt(short = "t", long, default_value = "3600")]
        max_time: f64,
    },
    /// Execute the scenario in every mode, one worker per mode.
    Sweep {
        #[structopt(short, long, default_value = "0.1")]
        dt: f64,
        #[structopt(short = "t", long, default_value = "3600")]
        max_time: f64,
    },
    PrintHeader,
}

/// Entry point shared by the demo binaries: parse, dispatch, report.
pub fn execute(name: &str, scene: &Scene, welds: &[Weld], args: Args) -> Result<(), PlanningError> {
    match args {
        Args::Run { mode, dt, max_time } => {
            let (row, sim) = run_once(name, scene, welds, mode, dt, max_time)?;
            report_header();
            println!("{row}");
            println!();
            print_robot_table(&sim);
            Ok(())
        }
        Args::Sweep { dt, max_time } => sweep(name, scene, welds, dt, max_time),
        Args::PrintHeader => {
            report_header();
            Ok(())
        }
    }
}

pub fn report_header() {
    println!(
        "{:>20} | {:>6} | {:>12} | {:>9} | {:>8} | {:>8} | {:>6} | {:>6} | {:>6}",
        "NAME", "MODE", "STATUS", "SIM_(S)", "WALL_(S)", "RAM_(MB)", "WELDS", "DONE", "BUSY_%"
    );
}

/// Plans and runs one scenario, returning its formatted report row.
pub fn run_row(
    name: &str,
    scene: &Scene,
    welds: &[Weld],
    mode: PlanMode,
    dt: f64,
    max_time: f64,
) -> Result<String, PlanningError> {
    run_once(name, scene, welds, mode, dt, max_time).map(|(row, _)| row)
}

fn run_once(
    name: &str,
    scene: &Scene,
    welds: &[Weld],
    mode: PlanMode,
    dt: f64,
    max_time: f64,
) -> Result<(String, Simulator), PlanningError> {
    let start = Instant::now();
    let plan = plan(welds, scene, mode)?;
    let mut sim = Simulator::new(plan, scene, dt)?;
    let status = sim.run_to_completion(max_time);
    let wall = start.elapsed();

    let report = sim.report();
    let busy = if report.robots.is_empty() {
        0.0
    } else {
        100.0
            * report
                .robots
                .iter()
                .map(|r| r.utilization(report.makespan))
                .sum::<f64>()
            / report.robots.len() as f64
    };

    let row = format!(
        "{:>20} | {:>6} | {:>12} | {:>9.1} | {:>8.2} | {:>8.2} | {:>6} | {:>6} | {:>6.1}",
        name,
        mode,
        status,
        report.makespan,
        wall.as_secs_f32(),
        PEAK_ALLOC.peak_usage_as_mb(),
        report.welds_total,
        report.welds_done,
        busy,
    );
    Ok((row, sim))
}

/// Runs the scenario under every mode, fanning the runs out over worker
/// threads, and prints one row per mode in a stable order.
pub fn sweep(
    name: &str,
    scene: &Scene,
    welds: &[Weld],
    dt: f64,
    max_time: f64,
) -> Result<(), PlanningError> {
    let modes = [PlanMode::WeldOnMove, PlanMode::StopAndWeld, PlanMode::Hybrid];
    let cursor = Mutex::new(0_usize);
    let rows: Mutex<Vec<(usize, Result<String, PlanningError>)>> = Mutex::new(vec![]);

    let workers = num_cpus::get().min(modes.len()).max(1);
    std::thread::scope(|s| {
        for _ in 0..workers {
            s.spawn(|| loop {
                let job = {
                    let mut next = cursor.lock();
                    let job = *next;
                    *next += 1;
                    job
                };
                if job >= modes.len() {
                    break;
                }
                let row = run_row(name, scene, welds, modes[job], dt, max_time);
                rows.lock().push((job, row));
            });
        }
    });

    let mut rows = rows.into_inner();
    rows.sort_unstable_by_key(|(job, _)| *job);

    report_header();
    for (_, row) in rows {
        println!("{}", row?);
    }
    Ok(())
}

/// Per-robot breakdown printed after a run when the embedder wants detail.
pub fn print_robot_table(sim: &Simulator) {
    let report = sim.report();
    println!(
        "{:>6} | {:>6} | {:>10} | {:>10} | {:>10} | {:>6}",
        "ROBOT", "WELDS", "WELD_(S)", "MOVE_(S)", "IDLE_(S)", "BUSY_%"
    );
    for row in &report.robots {
        println!(
            "{:>6} | {:>6} | {:>10.1} | {:>10.1} | {:>10.1} | {:>6.1}",
            row.name,
            row.welds_completed,
            row.time_welding,
            row.time_moving,
            row.time_idle,
            100.0 * row.utilization(report.makespan),
        );
    }
}
