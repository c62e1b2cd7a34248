//! Shared-zone arbitration. Each zone is a Y-band along the gantry in which
//! two robots' workspaces overlap; a per-zone mutex serializes access and a
//! strict priority order decides contention.

use bitset_fixed::BitSet;
use log::debug;

use crate::{PlanningError, RobotId, Scene, Span, ZoneId};

/// A named Y-band with a strict priority order over the robots allowed in.
#[derive(Debug, Clone)]
pub struct SharedZone {
    pub id: ZoneId,
    pub name: String,
    pub band: Span,
    /// Earlier entries win contention. A robot absent from the list ranks
    /// below every listed robot.
    pub priority: Vec<RobotId>,
    owner: Option<RobotId>,
}

impl SharedZone {
    pub fn new(id: ZoneId, name: impl Into<String>, band: Span, priority: Vec<RobotId>) -> Self {
        SharedZone {
            id,
            name: name.into(),
            band,
            priority,
            owner: None,
        }
    }

    pub fn contains_y(&self, y: f64) -> bool {
        self.band.contains(y)
    }

    pub fn owner(&self) -> Option<RobotId> {
        self.owner
    }

    fn rank(&self, robot: RobotId) -> usize {
        self.priority
            .iter()
            .position(|r| *r == robot)
            .unwrap_or(self.priority.len())
    }
}

/// Registry of shared zones plus the per-tick request sets that drive
/// priority preemption. Ownership mutates only through
/// [`CollisionManager::try_acquire`] and [`CollisionManager::release`].
#[derive(Debug, Clone)]
pub struct CollisionManager {
    zones: Vec<SharedZone>,
    /// One bit per robot, per zone, valid for the current tick.
    requests: Vec<BitSet>,
    nb_robots: usize,
}

impl CollisionManager {
    pub fn new(nb_robots: usize) -> Self {
        CollisionManager {
            zones: vec![],
            requests: vec![],
            nb_robots,
        }
    }

    /// Builds the registry from a validated scene, resolving priority names
    /// to robot ids.
    pub fn from_scene(scene: &Scene) -> Result<Self, PlanningError> {
        let mut mgr = CollisionManager::new(scene.robots.len());
        for spec in &scene.zones {
            let mut priority = Vec::with_capacity(spec.priority.len());
            for name in &spec.priority {
                let id = scene.robot_index(name).ok_or_else(|| {
                    PlanningError::InvalidScene(format!(
                        "zone {} names unknown robot {}",
                        spec.name, name
                    ))
                })?;
                priority.push(id);
            }
            mgr.register(&spec.name, Span::new(spec.band.0, spec.band.1), priority);
        }
        Ok(mgr)
    }

    pub fn register(&mut self, name: &str, band: Span, priority: Vec<RobotId>) {
        let id = ZoneId(self.zones.len());
        self.zones.push(SharedZone {
            id,
            name: name.to_string(),
            band,
            priority,
            owner: None,
        });
        self.requests.push(BitSet::new(self.nb_robots));
    }

    pub fn zones(&self) -> &[SharedZone] {
        &self.zones
    }

    pub fn zone(&self, id: ZoneId) -> &SharedZone {
        &self.zones[id.0]
    }

    /// Zones whose band contains `y`.
    pub fn which_zones(&self, y: f64) -> Vec<ZoneId> {
        self.zones
            .iter()
            .filter(|z| z.contains_y(y))
            .map(|z| z.id)
            .collect()
    }

    /// Forgets the previous tick's request sets. Call once per tick before
    /// any [`CollisionManager::note_request`].
    pub fn begin_tick(&mut self) {
        for set in self.requests.iter_mut() {
            *set = BitSet::new(self.nb_robots);
        }
    }

    /// Marks `robot` as contending for every zone containing `y` during the
    /// current tick.
    pub fn note_request(&mut self, robot: RobotId, y: f64) {
        for zone in &self.zones {
            if zone.contains_y(y) {
                self.requests[zone.id.0].set(robot.0, true);
            }
        }
    }

    /// Attempts to take every zone containing `y` for `robot`. Succeeds iff
    /// each such zone is unowned or already owned by `robot`, and no
    /// strictly higher-priority robot is requesting it this tick. Never
    /// fails hard; the caller parks the robot on `false`.
    pub fn try_acquire(&mut self, robot: RobotId, y: f64) -> bool {
        for zone in &self.zones {
            if !zone.contains_y(y) {
                continue;
            }
            if let Some(owner) = zone.owner {
                if owner != robot {
                    return false;
                }
            }
            let rank = zone.rank(robot);
            for contender in zone.priority.iter().take(rank) {
                if *contender != robot && self.requests[zone.id.0][contender.0] {
                    return false;
                }
            }
        }
        for zone in self.zones.iter_mut() {
            if zone.contains_y(y) && zone.owner.is_none() {
                debug!("zone {} acquired by robot {}", zone.name, robot);
                zone.owner = Some(robot);
            }
        }
        true
    }

    /// Clears any ownership held by `robot`. Idempotent.
    pub fn release(&mut self, robot: RobotId) {
        for zone in self.zones.iter_mut() {
            if zone.owner == Some(robot) {
                debug!("zone {} released by robot {}", zone.name, robot);
                zone.owner = None;
            }
        }
    }

    pub fn holds_any(&self, robot: RobotId) -> bool {
        self.zones.iter().any(|z| z.owner == Some(robot))
    }
}
