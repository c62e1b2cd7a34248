//! The master planner: validates the scene and the welds, partitions the
//! work between the two strategies, and emits one ordered plan (sweep
//! windows first, stops second).

pub mod saw;
pub mod splitter;
pub mod wom;

use log::info;
use rustc_hash::FxHashSet;

pub use saw::{plan_stops, stop_positions, StopPlan};
pub use splitter::{balance, imbalance, SplitRecord};
pub use wom::{group_by_proximity, plan_sweeps, SweepPlan};

use crate::{CollisionManager, Plan, PlanMode, PlanningError, Scene, Weld};

/// Produces a deterministic execution plan, or a structured planning error.
/// Pure: neither the scene nor the weld list is mutated; errors never leave
/// a partial plan behind.
pub fn plan(welds: &[Weld], scene: &Scene, mode: PlanMode) -> Result<Plan, PlanningError> {
    scene.validate()?;
    if scene.robots.is_empty() {
        return Err(PlanningError::EmptyScene("no robots"));
    }
    if welds.is_empty() {
        return Err(PlanningError::EmptyScene("no welds"));
    }

    let welds = checked(welds, scene)?;
    let zones = CollisionManager::from_scene(scene)?;
    let mut next_id = welds.iter().map(|w| w.id.id()).max().unwrap_or(0) + 1;

    let (to_sweep, mut to_stop) = match mode {
        PlanMode::WeldOnMove => (welds, vec![]),
        PlanMode::StopAndWeld => (vec![], welds),
        PlanMode::Hybrid => welds
            .into_iter()
            .partition(|w| w.length() >= wom::MIN_WOM_LENGTH),
    };

    let sweep = plan_sweeps(to_sweep, scene, zones.zones(), &mut next_id)?;
    if mode == PlanMode::WeldOnMove {
        if let Some(w) = sweep.overflow.first() {
            return Err(PlanningError::UnreachableWeld {
                weld: w.id,
                side: w.side,
                y: w.y,
            });
        }
    }
    to_stop.extend(sweep.overflow);

    let stops = if to_stop.is_empty() {
        StopPlan { stops: vec![], welds: vec![] }
    } else {
        plan_stops(to_stop, scene)?
    };

    let mut arena = sweep.welds;
    arena.extend(stops.welds);

    let gantry_start_x = if sweep.windows.is_empty() {
        stops.stops.first().map(|s| s.x).unwrap_or(0.0)
    } else {
        sweep.gantry_start_x
    }
    .clamp(0.0, scene.gantry.x_length);

    let plan = Plan {
        mode,
        windows: sweep.windows,
        stops: stops.stops,
        welds: arena,
        gantry_start_x,
    };
    info!(
        "planned {} tasks over {} windows and {} stops in {} mode",
        plan.task_count(),
        plan.windows.len(),
        plan.stops.len(),
        mode
    );
    Ok(plan)
}

/// Normalizes the client's welds and rejects broken or unreachable ones.
fn checked(welds: &[Weld], scene: &Scene) -> Result<Vec<Weld>, PlanningError> {
    let robots = scene.spawn_robots();
    let mut out = Vec::with_capacity(welds.len());
    let mut seen = FxHashSet::default();

    for w in welds {
        if !seen.insert(w.id) {
            return Err(PlanningError::InvalidGeometry {
                weld: w.id,
                reason: "duplicate weld id".to_string(),
            });
        }
        if !(w.x_start.is_finite() && w.x_end.is_finite() && w.y.is_finite()) {
            return Err(PlanningError::InvalidGeometry {
                weld: w.id,
                reason: "non-finite coordinates".to_string(),
            });
        }
        let mut weld = Weld::new(w.id.id(), w.x_start, w.x_end, w.y, w.side);
        weld.done = w.done.clamp(0.0, weld.length());
        weld.parent = w.parent;
        if weld.length() <= 0.0 {
            return Err(PlanningError::InvalidGeometry {
                weld: weld.id,
                reason: "zero length".to_string(),
            });
        }
        if weld.x_start < 0.0 || weld.x_end > scene.gantry.x_length {
            return Err(PlanningError::InvalidGeometry {
                weld: weld.id,
                reason: format!(
                    "extent [{:.1}, {:.1}] leaves the gantry travel",
                    weld.x_start, weld.x_end
                ),
            });
        }
        if !robots
            .iter()
            .any(|r| r.side == weld.side && r.can_visit(weld.y))
        {
            return Err(PlanningError::UnreachableWeld {
                weld: weld.id,
                side: weld.side,
                y: weld.y,
            });
        }
        out.push(weld);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{GantrySpec, RobotSpec, Side};

    use super::*;

    fn two_sided_scene() -> Scene {
        Scene::new(
            GantrySpec { x_length: 8000.0, x_speed: 300.0 },
            vec![
                RobotSpec::new("R1", Side::XPlus, (0.0, 1000.0), 120.0),
                RobotSpec::new("R2", Side::XMinus, (0.0, 1000.0), 120.0),
            ],
        )
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let scene = two_sided_scene();
        assert_eq!(
            plan(&[], &scene, PlanMode::Hybrid),
            Err(PlanningError::EmptyScene("no welds"))
        );

        let empty = Scene::new(GantrySpec { x_length: 8000.0, x_speed: 300.0 }, vec![]);
        let welds = [Weld::new(1, 0.0, 500.0, 100.0, Side::XPlus)];
        assert_eq!(
            plan(&welds, &empty, PlanMode::Hybrid),
            Err(PlanningError::EmptyScene("no robots"))
        );
    }

    #[test]
    fn broken_geometry_is_rejected() {
        let scene = two_sided_scene();
        let zero = [Weld::new(1, 500.0, 500.0, 100.0, Side::XPlus)];
        assert!(matches!(
            plan(&zero, &scene, PlanMode::Hybrid),
            Err(PlanningError::InvalidGeometry { .. })
        ));

        let outside = [Weld::new(1, 7500.0, 8500.0, 100.0, Side::XPlus)];
        assert!(matches!(
            plan(&outside, &scene, PlanMode::Hybrid),
            Err(PlanningError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn unreachable_welds_fail_the_whole_plan() {
        let scene = two_sided_scene();
        // y = 3500 is beyond y_max + reach = 3000
        let welds = [Weld::new(1, 0.0, 500.0, 3500.0, Side::XPlus)];
        assert_eq!(
            plan(&welds, &scene, PlanMode::StopAndWeld),
            Err(PlanningError::UnreachableWeld {
                weld: crate::WeldId(1),
                side: Side::XPlus,
                y: 3500.0
            })
        );
    }

    #[test]
    fn hybrid_partitions_on_sweep_eligibility() {
        let scene = two_sided_scene();
        let welds = [
            Weld::new(1, 100.0, 2100.0, 100.0, Side::XPlus), // long: sweep
            Weld::new(2, 300.0, 450.0, 600.0, Side::XMinus), // short: stop
        ];
        let plan = plan(&welds, &scene, PlanMode::Hybrid).unwrap();
        assert_eq!(plan.windows.len(), 1);
        assert!(!plan.stops.is_empty());
        assert_eq!(plan.welds.len(), 2);
        assert_eq!(plan.windows[0].tasks[0].weld.id(), 1);
    }

    #[test]
    fn pure_modes_feed_everything_to_one_strategy() {
        let scene = two_sided_scene();
        let welds = [
            Weld::new(1, 100.0, 2100.0, 100.0, Side::XPlus),
            Weld::new(2, 300.0, 450.0, 600.0, Side::XMinus),
        ];

        let wom = plan(&welds, &scene, PlanMode::WeldOnMove).unwrap();
        assert!(wom.stops.is_empty());
        assert_eq!(wom.task_count(), 2);

        let saw = plan(&welds, &scene, PlanMode::StopAndWeld).unwrap();
        assert!(saw.windows.is_empty());
        assert!(saw.task_count() >= 2);
        assert_eq!(saw.gantry_start_x, saw.stops[0].x);
    }
}
