//! Weld-on-move planning: group welds by X proximity, give each weld to one
//! robot on its side, fix a per-robot Y for every window, resolve shared-band
//! geometry, and pick the gantry start that lets every first weld begin the
//! moment the sweep reaches it.

use log::debug;
use ordered_float::OrderedFloat;

use crate::{
    queue::WeldQueue, splitter, PlanningError, Robot, RobotId, Scene, SharedZone, SplitRecord,
    Task, Weld, Window,
};

/// Welds shorter than this are no use on the move and belong at a stop.
pub const MIN_WOM_LENGTH: f64 = 300.0;
/// Two welds whose X extents are closer than this share a window outright.
pub const MAX_GROUP_GAP: f64 = 500.0;

/// What the sweep planner produced. `overflow` holds welds no robot on the
/// right side could take at a held Y; the master planner either reroutes
/// them to stops or fails the plan.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub windows: Vec<Window>,
    /// The welds the windows reference, splitter fragments included.
    pub welds: Vec<Weld>,
    pub overflow: Vec<Weld>,
    pub splits: Vec<SplitRecord>,
    pub gantry_start_x: f64,
}

/// Plans continuous-motion execution for `welds`. `next_id` is the id
/// fountain for splitter fragments and is shared with the rest of the plan.
pub fn plan_sweeps(
    welds: Vec<Weld>,
    scene: &Scene,
    zones: &[SharedZone],
    next_id: &mut usize,
) -> Result<SweepPlan, PlanningError> {
    let robots = scene.spawn_robots();
    let mut loads = vec![0.0_f64; robots.len()];
    let mut plan = SweepPlan {
        windows: vec![],
        welds: vec![],
        overflow: vec![],
        splits: vec![],
        gantry_start_x: 0.0,
    };

    for group in group_by_proximity(welds, scene.reach) {
        // one robot per weld, side-matching, nearest band first
        let mut assign: Vec<Vec<Weld>> = vec![vec![]; robots.len()];
        for weld in group {
            match pick_robot(&weld, &robots, &loads) {
                Some(robot) => {
                    loads[robot.0] += weld.length();
                    assign[robot.0].push(weld);
                }
                None => plan.overflow.push(weld),
            }
        }
        if assign.iter().all(Vec::is_empty) {
            continue;
        }

        let mut splits = splitter::balance(&mut assign, zones, next_id);
        plan.splits.append(&mut splits);

        let mut hold_y: Vec<Option<f64>> = assign
            .iter()
            .map(|welds| optimal_y(welds))
            .collect();
        let contended = spread_in_bands(&robots, zones, &mut hold_y, scene.safe_distance);

        plan.windows
            .push(emit_window(&robots, assign, &hold_y, &contended, &mut plan.welds));
    }

    plan.gantry_start_x = compute_start(plan.windows.first(), &robots, scene.reach);
    debug!(
        "sweep plan: {} windows, {} overflow welds, gantry start {:.1}",
        plan.windows.len(),
        plan.overflow.len(),
        plan.gantry_start_x
    );
    Ok(plan)
}

/// Splits the welds, taken in ascending `x_start` order, into groups whose
/// successive extents are within `MAX_GROUP_GAP` (or one reach) of each
/// other.
pub fn group_by_proximity(welds: Vec<Weld>, reach: f64) -> Vec<Vec<Weld>> {
    let mut queue = WeldQueue::by_x_start(welds);
    let mut groups: Vec<Vec<Weld>> = vec![];
    let mut x_max = f64::NEG_INFINITY;

    while let Some(weld) = queue.pop() {
        let gap = weld.x_start - x_max;
        if groups.is_empty() || (gap > MAX_GROUP_GAP && gap > reach) {
            groups.push(vec![]);
            x_max = weld.x_end;
        } else {
            x_max = x_max.max(weld.x_end);
        }
        groups.last_mut().expect("group opened above").push(weld);
    }
    groups
}

/// The robot that takes `weld`, or `None` when every side-matching robot is
/// out of reach. In-band robots win by band-center distance; gap welds go to
/// the upper bracket first, then by load, center distance and id.
fn pick_robot(weld: &Weld, robots: &[Robot], loads: &[f64]) -> Option<RobotId> {
    let dist = |r: &Robot| (weld.y - r.workspace_center()).abs();

    let in_range = robots
        .iter()
        .filter(|r| r.side == weld.side && r.in_nominal_range(weld.y))
        .min_by_key(|r| (OrderedFloat(dist(r)), OrderedFloat(loads[r.id.0]), r.id.0));
    if let Some(robot) = in_range {
        return Some(robot.id);
    }

    let reachable: Vec<&Robot> = robots
        .iter()
        .filter(|r| r.side == weld.side && r.can_hold(weld.y))
        .collect();
    let uppers: Vec<&&Robot> = reachable.iter().filter(|r| r.y_min > weld.y).collect();
    let pool: Vec<&&Robot> = if uppers.is_empty() {
        reachable.iter().filter(|r| r.y_max < weld.y).collect()
    } else {
        uppers
    };
    pool.into_iter()
        .min_by_key(|r| (OrderedFloat(loads[r.id.0]), OrderedFloat(dist(r)), r.id.0))
        .map(|r| r.id)
}

/// Length-weighted mean Y of the assigned welds, or `None` when idle this
/// window. Deliberately unclamped; feasibility was checked at assignment.
fn optimal_y(welds: &[Weld]) -> Option<f64> {
    let total: f64 = welds.iter().map(Weld::length).sum();
    if total <= 0.0 {
        return None;
    }
    Some(welds.iter().map(|w| w.length() * w.y).sum::<f64>() / total)
}

/// Pushes the two owners of each band apart until they hold `safe_distance`
/// of separation. Returns the robots whose tasks must expect to queue on the
/// zone mutex because reach limits made the spread infeasible.
fn spread_in_bands(
    robots: &[Robot],
    zones: &[SharedZone],
    hold_y: &mut [Option<f64>],
    safe_distance: f64,
) -> Vec<RobotId> {
    let mut contended = vec![];

    for zone in zones {
        let (a, b) = match (zone.priority.first(), zone.priority.get(1)) {
            (Some(a), Some(b)) => (*a, *b),
            _ => continue,
        };
        let (Some(ya), Some(yb)) = (
            hold_y.get(a.0).copied().flatten(),
            hold_y.get(b.0).copied().flatten(),
        ) else {
            continue;
        };
        if !zone.contains_y(ya) || !zone.contains_y(yb) {
            continue;
        }
        let gap = (ya - yb).abs();
        if gap >= safe_distance {
            continue;
        }

        // upper robot climbs, lower robot dips, equally
        let (upper, lower) = if ya > yb || (ya == yb && a.0 > b.0) {
            (a, b)
        } else {
            (b, a)
        };
        let needed = 0.5 * (safe_distance - gap);
        let y_up = hold_y[upper.0].expect("checked above") + needed;
        let y_dn = hold_y[lower.0].expect("checked above") - needed;
        if robots[upper.0].can_hold(y_up) && robots[lower.0].can_hold(y_dn) {
            hold_y[upper.0] = Some(y_up);
            hold_y[lower.0] = Some(y_dn);
        } else {
            // no room to separate: the lower-priority owner queues at runtime
            let loser = if zone.priority.iter().position(|r| *r == a)
                < zone.priority.iter().position(|r| *r == b)
            {
                b
            } else {
                a
            };
            contended.push(loser);
        }
    }
    contended
}

fn emit_window(
    robots: &[Robot],
    assign: Vec<Vec<Weld>>,
    hold_y: &[Option<f64>],
    contended: &[RobotId],
    arena: &mut Vec<Weld>,
) -> Window {
    let mut window = Window {
        x_start: f64::INFINITY,
        x_end: f64::NEG_INFINITY,
        tasks: vec![],
    };

    for (slot, mut welds) in assign.into_iter().enumerate() {
        if welds.is_empty() {
            continue;
        }
        let robot = robots[slot].id;
        let y = hold_y[slot].expect("a robot with welds has a hold position");
        welds.sort_unstable_by_key(|w| (OrderedFloat(w.x_start), w.id.id()));

        for weld in welds {
            window.x_start = window.x_start.min(weld.x_start);
            window.x_end = window.x_end.max(weld.x_end);
            window.tasks.push(Task {
                weld: weld.id,
                robot,
                y,
                x_start: weld.x_start,
                x_end: weld.x_end,
                expect_contention: contended.contains(&robot),
            });
            arena.push(weld);
        }
    }
    window
}

/// The lowest gantry X that keeps every robot's first weld within reach at
/// sweep start, so all robots can strike their arcs together.
fn compute_start(first: Option<&Window>, robots: &[Robot], reach: f64) -> f64 {
    let Some(window) = first else { return 0.0 };

    let mut highest_min = f64::NEG_INFINITY;
    let mut earliest_start = f64::INFINITY;
    for robot in robots {
        let first_start = window
            .tasks
            .iter()
            .filter(|t| t.robot == robot.id)
            .map(|t| OrderedFloat(t.x_start))
            .min()
            .map(|x| x.0);
        let Some(fw_start) = first_start else { continue };
        highest_min = highest_min.max(fw_start - reach - robot.offset_x);
        earliest_start = earliest_start.min(fw_start);
    }
    if earliest_start.is_infinite() {
        return 0.0;
    }
    highest_min.max(earliest_start).max(0.0)
}
