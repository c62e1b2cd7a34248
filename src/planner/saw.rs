//! Stop-and-weld planning: lay a ladder of gantry stops over the welds' X
//! spread, attach every weld to the stops that can reach it, and queue each
//! stop's work greedily onto the robots.

use log::debug;
use ordered_float::OrderedFloat;

use crate::{queue::WeldQueue, PlanningError, Scene, Stop, Task, Weld};

/// Nominal spacing between consecutive stops, mm.
pub const STOP_SPACING: f64 = 500.0;
/// How far in X a TCP works from a stationary gantry, mm.
pub const STOP_X_REACH: f64 = 400.0;
/// Penalty, in mm per queued task, that steers the greedy assignment away
/// from already-busy robots.
pub const STOP_LOAD_WEIGHT: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct StopPlan {
    pub stops: Vec<Stop>,
    /// The welds the stops reference; stop passes never re-cut a weld.
    pub welds: Vec<Weld>,
}

/// Evenly centered stop X positions over the welds' X spread: one midpoint
/// stop when the spread fits [`STOP_SPACING`], else `ceil(spread / spacing)`
/// bins with a stop at each bin center.
pub fn stop_positions(welds: &[Weld]) -> Vec<f64> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for w in welds {
        lo = lo.min(w.x_start);
        hi = hi.max(w.x_end);
    }
    if welds.is_empty() {
        return vec![];
    }
    let spread = hi - lo;
    if spread <= STOP_SPACING {
        return vec![0.5 * (lo + hi)];
    }
    let n = (spread / STOP_SPACING).ceil() as usize;
    let pitch = spread / n as f64;
    (0..n).map(|i| lo + (i as f64 + 0.5) * pitch).collect()
}

/// Plans discrete-stop execution for `welds`.
pub fn plan_stops(welds: Vec<Weld>, scene: &Scene) -> Result<StopPlan, PlanningError> {
    let robots = scene.spawn_robots();
    let positions = stop_positions(&welds);

    // attach welds to stops: a single pass at the nearest stop that covers
    // the whole extent, or one pass per stop across a wide weld
    let mut drafts: Vec<Vec<Weld>> = vec![vec![]; positions.len()];
    for weld in &welds {
        let covering = positions
            .iter()
            .enumerate()
            .filter(|(_, x)| weld.x_start >= *x - STOP_X_REACH && weld.x_end <= *x + STOP_X_REACH)
            .min_by_key(|(_, x)| OrderedFloat((weld.x_center() - *x).abs()));
        if let Some((slot, _)) = covering {
            drafts[slot].push(weld.clone());
            continue;
        }

        // wide weld: consecutive stops each weld their local X portion
        let mut cursor = weld.x_start;
        for (slot, x) in positions.iter().enumerate() {
            let window_hi = x + STOP_X_REACH;
            if window_hi <= cursor {
                continue;
            }
            let portion_hi = window_hi.min(weld.x_end);
            if portion_hi <= cursor {
                break;
            }
            let mut pass = weld.clone();
            pass.x_start = cursor;
            pass.x_end = portion_hi;
            drafts[slot].push(pass);
            cursor = portion_hi;
            if cursor >= weld.x_end {
                break;
            }
        }
        if cursor < weld.x_end {
            return Err(PlanningError::InvalidGeometry {
                weld: weld.id,
                reason: format!("extends past the last stop at x={:.1}", cursor),
            });
        }
    }

    // queue each stop's passes bottom-to-top onto the cheapest robot
    let mut sim_y: Vec<f64> = robots.iter().map(|r| r.workspace_center()).collect();
    let mut stops = vec![];
    for (slot, passes) in drafts.into_iter().enumerate() {
        if passes.is_empty() {
            continue;
        }
        let mut queue = WeldQueue::by_y(passes);
        let mut queued = vec![0_usize; robots.len()];
        let mut stop = Stop { x: positions[slot], tasks: vec![] };

        while let Some(pass) = queue.pop() {
            let chosen = robots
                .iter()
                .filter(|r| r.side == pass.side && r.can_visit(pass.y))
                .min_by_key(|r| {
                    let cost =
                        (pass.y - sim_y[r.id.0]).abs() + STOP_LOAD_WEIGHT * queued[r.id.0] as f64;
                    (OrderedFloat(cost), r.id.0)
                });
            let Some(robot) = chosen else {
                return Err(PlanningError::UnreachableWeld {
                    weld: pass.id,
                    side: pass.side,
                    y: pass.y,
                });
            };
            sim_y[robot.id.0] = pass.y;
            queued[robot.id.0] += 1;
            stop.tasks.push(Task {
                weld: pass.id,
                robot: robot.id,
                y: pass.y,
                x_start: pass.x_start,
                x_end: pass.x_end,
                expect_contention: false,
            });
        }
        stops.push(stop);
    }

    debug!("stop plan: {} stops over {} welds", stops.len(), welds.len());
    Ok(StopPlan { stops, welds })
}
