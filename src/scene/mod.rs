//! Static scene description: gantry geometry, robot mounts and kinematic
//! limits, and the shared Y-bands where workspaces overlap.
//!
//! The core defines no file format for scenes; embedders build them in code
//! and hand them to the planner.

use crate::{Gantry, PlanningError, Robot, RobotId, Side};

/// Default effective working radius from the carriage, mm.
pub const DEFAULT_REACH: f64 = 2000.0;
/// Default minimum Y separation between two robots parked in one band, mm.
pub const DEFAULT_SAFE_DISTANCE: f64 = 150.0;

#[derive(Debug, Clone, Copy)]
pub struct GantrySpec {
    pub x_length: f64,
    /// Maximum X-speed, mm/s.
    pub x_speed: f64,
}

#[derive(Debug, Clone)]
pub struct RobotSpec {
    pub name: String,
    pub side: Side,
    /// Nominal working band; reach extends beyond it.
    pub y_range: (f64, f64),
    /// TCP speed, mm/s.
    pub tcp_speed: f64,
    /// Carriage X-offset relative to the gantry reference.
    pub offset_x: f64,
}

impl RobotSpec {
    pub fn new(name: impl Into<String>, side: Side, y_range: (f64, f64), tcp_speed: f64) -> Self {
        RobotSpec {
            name: name.into(),
            side,
            y_range,
            tcp_speed,
            offset_x: side.default_offset(),
        }
    }

    pub fn with_offset(mut self, offset_x: f64) -> Self {
        self.offset_x = offset_x;
        self
    }
}

/// A Y-band in which two robots' workspaces overlap, guarded at runtime by a
/// mutex. Priority names are resolved against the scene's robot list.
#[derive(Debug, Clone)]
pub struct ZoneSpec {
    pub name: String,
    pub band: (f64, f64),
    /// Strict priority order; earlier names win contention.
    pub priority: Vec<String>,
}

impl ZoneSpec {
    pub fn new(name: impl Into<String>, band: (f64, f64), priority: &[&str]) -> Self {
        ZoneSpec {
            name: name.into(),
            band,
            priority: priority.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub gantry: GantrySpec,
    pub robots: Vec<RobotSpec>,
    pub zones: Vec<ZoneSpec>,
    pub reach: f64,
    pub safe_distance: f64,
}

impl Scene {
    pub fn new(gantry: GantrySpec, robots: Vec<RobotSpec>) -> Self {
        Scene {
            gantry,
            robots,
            zones: vec![],
            reach: DEFAULT_REACH,
            safe_distance: DEFAULT_SAFE_DISTANCE,
        }
    }

    pub fn with_zone(mut self, zone: ZoneSpec) -> Self {
        self.zones.push(zone);
        self
    }

    pub fn with_reach(mut self, reach: f64) -> Self {
        self.reach = reach;
        self
    }

    pub fn robot_index(&self, name: &str) -> Option<RobotId> {
        self.robots
            .iter()
            .position(|r| r.name == name)
            .map(RobotId)
    }

    /// Structural sanity of the description itself. Weld-related checks
    /// belong to the planner.
    pub fn validate(&self) -> Result<(), PlanningError> {
        let fail = |msg: String| Err(PlanningError::InvalidScene(msg));

        if !(self.gantry.x_length > 0.0) {
            return fail(format!("gantry length {} must be positive", self.gantry.x_length));
        }
        if !(self.gantry.x_speed > 0.0) {
            return fail(format!("gantry speed {} must be positive", self.gantry.x_speed));
        }
        if !(self.reach > 0.0) {
            return fail(format!("reach {} must be positive", self.reach));
        }
        if self.safe_distance < 0.0 {
            return fail(format!("safe distance {} must be non-negative", self.safe_distance));
        }
        for spec in &self.robots {
            if !(spec.y_range.0 < spec.y_range.1) {
                return fail(format!("robot {} has an empty y-range", spec.name));
            }
            if !(spec.tcp_speed > 0.0) {
                return fail(format!("robot {} has a non-positive tcp speed", spec.name));
            }
            if self.robots.iter().filter(|r| r.name == spec.name).count() > 1 {
                return fail(format!("duplicate robot name {}", spec.name));
            }
        }
        for zone in &self.zones {
            if !(zone.band.0 < zone.band.1) {
                return fail(format!("zone {} has an empty band", zone.name));
            }
            if zone.priority.is_empty() {
                return fail(format!("zone {} has an empty priority list", zone.name));
            }
            for name in &zone.priority {
                if self.robot_index(name).is_none() {
                    return fail(format!("zone {} names unknown robot {}", zone.name, name));
                }
            }
        }
        Ok(())
    }

    /// Instantiates the mutable robot entities, each parked at its workspace
    /// center.
    pub fn spawn_robots(&self) -> Vec<Robot> {
        self.robots
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                Robot::new(
                    RobotId(i),
                    spec.name.clone(),
                    spec.side,
                    spec.y_range.0,
                    spec.y_range.1,
                    spec.tcp_speed,
                    spec.offset_x,
                    self.reach,
                )
            })
            .collect()
    }

    pub fn spawn_gantry(&self, start_x: f64) -> Gantry {
        Gantry::new(start_x, self.gantry.x_speed, self.gantry.x_length)
    }
}
