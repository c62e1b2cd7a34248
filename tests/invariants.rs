//! Properties that must hold on every tick of every run: single band
//! ownership, monotone bounded weld progress, sweep speed tied to the
//! slowest welder, bounded axis speeds, window postconditions, and split
//! conservation.

use gantryline::{
    plan, GantrySpec, PlanMode, Robot, RobotState, RobotSpec, Scene, Side, Simulator, Weld,
    ZoneSpec,
};
use pretty_assertions::assert_eq;

const DT: f64 = 0.1;
const EPS: f64 = 1e-9;

fn field_scene() -> Scene {
    Scene::new(
        GantrySpec { x_length: 6000.0, x_speed: 300.0 },
        vec![
            RobotSpec::new("R1", Side::XPlus, (0.0, 1400.0), 120.0),
            RobotSpec::new("R2", Side::XMinus, (0.0, 1400.0), 100.0),
            RobotSpec::new("R3", Side::XPlus, (1600.0, 3000.0), 120.0),
            RobotSpec::new("R4", Side::XMinus, (1600.0, 3000.0), 100.0),
        ],
    )
    .with_zone(ZoneSpec::new("s1", (1300.0, 1700.0), &["R1", "R3"]))
    .with_zone(ZoneSpec::new("s2", (1300.0, 1700.0), &["R2", "R4"]))
}

fn field_welds() -> Vec<Weld> {
    let rows = [250.0, 700.0, 1500.0, 2200.0, 2800.0];
    (0..12_usize)
        .map(|i| {
            let x = 200.0 + 450.0 * i as f64;
            let side = if i % 2 == 0 { Side::XPlus } else { Side::XMinus };
            let length = if i % 3 == 2 { 150.0 } else { 800.0 };
            Weld::new(i + 1, x, x + length, rows[i % rows.len()], side)
        })
        .collect()
}

/// Steps a plan to completion while checking the per-tick invariants.
fn run_checked(scene: &Scene, welds: &[Weld], mode: PlanMode) -> Simulator {
    let plan = plan(welds, scene, mode).unwrap();

    // optimal start: every first-window weld starts within reach of its
    // robot's carriage at the start position
    if let Some(first) = plan.windows.first() {
        let robots = scene.spawn_robots();
        for robot in &robots {
            let fw = first
                .tasks
                .iter()
                .filter(|t| t.robot == robot.id)
                .map(|t| t.x_start)
                .fold(f64::INFINITY, f64::min);
            if fw.is_finite() {
                let carriage = plan.gantry_start_x + robot.offset_x;
                assert!(
                    (fw - carriage).abs() <= scene.reach + EPS,
                    "robot {} cannot reach its first weld at start",
                    robot.name
                );
            }
        }
    }

    let mut sim = Simulator::new(plan, scene, DT).unwrap();
    let mut prev_done: Vec<f64> = sim.welds().iter().map(|w| w.done).collect();
    let mut prev_y: Vec<f64> = sim.robots().iter().map(|r| r.current_y).collect();
    let mut exact_speed_seen = false;

    for _ in 0..100_000 {
        let x_before = sim.gantry().x;
        let window_before = sim.window_index();
        let out = sim.step();

        // gantry stays on its rails
        let gantry = sim.gantry();
        assert!(gantry.x >= -EPS && gantry.x <= gantry.x_length + EPS);

        // weld progress is bounded and monotone
        for (slot, weld) in sim.welds().iter().enumerate() {
            assert!(weld.done >= prev_done[slot] - EPS);
            assert!(weld.done >= -EPS && weld.done <= weld.length() + EPS);
            prev_done[slot] = weld.done;
        }

        // no axis outruns its speed limit
        for (slot, robot) in sim.robots().iter().enumerate() {
            assert!((robot.current_y - prev_y[slot]).abs() <= robot.tcp_speed * DT + EPS);
            prev_y[slot] = robot.current_y;
        }

        // at most one welder per band, and it is the band's owner
        for zone in sim.collision().zones() {
            let inside: Vec<&Robot> = sim
                .robots()
                .iter()
                .filter(|r| r.state == RobotState::Welding && zone.contains_y(r.current_y))
                .collect();
            assert!(inside.len() <= 1, "zone {} has {} welders", zone.name, inside.len());
            if let Some(robot) = inside.first() {
                assert_eq!(zone.owner(), Some(robot.id));
            }
        }

        // a moving sweep never outruns its slowest welder
        if !out.welding.is_empty() {
            let min_tcp = out
                .welding
                .iter()
                .map(|r| sim.robots()[r.id()].tcp_speed)
                .fold(f64::INFINITY, f64::min);
            let delta = sim.gantry().x - x_before;
            assert!(delta <= min_tcp * DT + EPS);
            if (delta - min_tcp * DT).abs() <= EPS {
                exact_speed_seen = true;
            }
        }

        // a closed window leaves no weld behind
        if sim.window_index() > window_before {
            for task in &sim.plan().windows[window_before].tasks {
                let weld = sim
                    .welds()
                    .iter()
                    .find(|w| w.id == task.weld)
                    .expect("window weld in arena");
                assert!(weld.is_complete());
            }
        }

        assert!(out.warnings.is_empty(), "unexpected stall: {:?}", out.warnings);
        if out.is_complete {
            break;
        }
    }

    assert!(sim.is_complete(), "run did not finish");
    assert!(sim.welds().iter().all(Weld::is_complete));
    if sim.plan().windows.iter().any(|w| !w.tasks.is_empty()) {
        assert!(exact_speed_seen, "the sweep never ran at the slowest welder's pace");
    }
    sim
}

#[test]
fn invariants_hold_on_the_move() {
    run_checked(&field_scene(), &field_welds(), PlanMode::WeldOnMove);
}

#[test]
fn invariants_hold_at_stops() {
    run_checked(&field_scene(), &field_welds(), PlanMode::StopAndWeld);
}

#[test]
fn invariants_hold_in_hybrid_runs() {
    run_checked(&field_scene(), &field_welds(), PlanMode::Hybrid);
}

/// A lopsided band triggers the splitter; fragments must conserve their
/// parent's length exactly and the run must still complete.
#[test]
fn split_fragments_conserve_length() {
    let scene = Scene::new(
        GantrySpec { x_length: 6000.0, x_speed: 300.0 },
        vec![
            RobotSpec::new("R1", Side::XPlus, (0.0, 1000.0), 120.0),
            RobotSpec::new("R3", Side::XPlus, (2000.0, 3000.0), 90.0),
        ],
    )
    .with_zone(ZoneSpec::new("s1", (1400.0, 1600.0), &["R1", "R3"]));

    let welds = [
        Weld::new(1, 100.0, 3600.0, 500.0, Side::XPlus),
        Weld::new(2, 100.0, 1100.0, 2500.0, Side::XPlus),
        Weld::new(3, 500.0, 2500.0, 1500.0, Side::XPlus),
    ];
    let planned = plan(&welds, &scene, PlanMode::WeldOnMove).unwrap();

    let fragments: Vec<&Weld> = planned
        .welds
        .iter()
        .filter(|w| w.parent == Some(gantryline::WeldId(3)))
        .collect();
    assert_eq!(fragments.len(), 2);
    let total: f64 = fragments.iter().map(|w| w.length()).sum();
    assert!((total - 2000.0).abs() < EPS);
    for fragment in &fragments {
        assert!(fragment.length() >= 100.0);
    }
    // the parent entity is gone from the plan, replaced by its fragments
    assert!(planned.welds.iter().all(|w| w.id != gantryline::WeldId(3)));

    let sim = run_checked(&scene, &welds, PlanMode::WeldOnMove);
    assert_eq!(sim.report().welds_done, 4);
}
