use std::{fmt::Display, str::FromStr};

/// This is a type-safe identifier for a weld. Welds created by the client
/// keep their original numbering; fragments minted by the zone splitter get
/// fresh ids past the largest client id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeldId(pub usize);

impl WeldId {
    pub fn id(self) -> usize {
        self.0
    }
}
impl Display for WeldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A type-safe identifier for a robot: its position in the scene's robot list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RobotId(pub usize);

impl RobotId {
    pub fn id(self) -> usize {
        self.0
    }
}
impl Display for RobotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A type-safe identifier for a shared zone: its position in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoneId(pub usize);

impl ZoneId {
    pub fn id(self) -> usize {
        self.0
    }
}

/// Which side of the gantry a robot (and a weld) sits on. Robots only weld
/// seams on their own side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    XPlus,
    XMinus,
}
impl Side {
    /// Default carriage X-offset for a robot mounted on this side.
    pub fn default_offset(self) -> f64 {
        match self {
            Side::XPlus => 300.0,
            Side::XMinus => -300.0,
        }
    }
}
impl Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::XPlus => write!(f, "x+"),
            Side::XMinus => write!(f, "x-"),
        }
    }
}

/// The execution regime a plan was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanMode {
    /// Continuous sweep: the gantry moves while robots weld at fixed Y.
    WeldOnMove,
    /// Discrete stops: the gantry halts while robots traverse Y and weld.
    StopAndWeld,
    /// Long seams on the move, leftovers at stops.
    Hybrid,
}
impl FromStr for PlanMode {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wom" => Ok(Self::WeldOnMove),
            "saw" => Ok(Self::StopAndWeld),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err("The only supported modes are 'wom', 'saw' and 'hybrid'"),
        }
    }
}
impl Display for PlanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WeldOnMove => write!(f, "wom"),
            Self::StopAndWeld => write!(f, "saw"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Per-robot state in the simulation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RobotState {
    Idle,
    MovingY,
    Welding,
    WaitMutex,
}
impl Display for RobotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::MovingY => write!(f, "moving-y"),
            Self::Welding => write!(f, "welding"),
            Self::WaitMutex => write!(f, "wait-mutex"),
        }
    }
}

/// How a simulation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Completed,
    Interrupted,
}
impl Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "complete"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// A straight seam parallel to X at fixed Y, on one of the two gantry sides.
#[derive(Debug, Clone, PartialEq)]
pub struct Weld {
    pub id: WeldId,
    pub x_start: f64,
    pub x_end: f64,
    pub y: f64,
    pub side: Side,
    /// Welded length so far, in `[0, length]`.
    pub done: f64,
    /// Set on fragments minted by the zone splitter.
    pub parent: Option<WeldId>,
}

impl Weld {
    /// Creates a weld, normalizing the X extent so that `x_end >= x_start`.
    pub fn new(id: usize, x_start: f64, x_end: f64, y: f64, side: Side) -> Self {
        let (lo, hi) = if x_end < x_start {
            (x_end, x_start)
        } else {
            (x_start, x_end)
        };
        Weld {
            id: WeldId(id),
            x_start: lo,
            x_end: hi,
            y,
            side,
            done: 0.0,
            parent: None,
        }
    }

    pub fn length(&self) -> f64 {
        self.x_end - self.x_start
    }

    pub fn remaining(&self) -> f64 {
        (self.length() - self.done).max(0.0)
    }

    pub fn is_complete(&self) -> bool {
        self.done >= self.length() - 1e-9
    }

    pub fn x_center(&self) -> f64 {
        0.5 * (self.x_start + self.x_end)
    }
}

/// A welding robot riding the gantry carriage. Mutable fields evolve tick by
/// tick; the rest is copied from the scene at spawn time.
#[derive(Debug, Clone)]
pub struct Robot {
    pub id: RobotId,
    pub name: String,
    pub side: Side,
    pub y_min: f64,
    pub y_max: f64,
    pub tcp_speed: f64,
    /// X-offset of this carriage slot relative to the gantry reference.
    pub offset_x: f64,
    /// Effective working radius from the carriage position.
    pub reach: f64,
    pub current_y: f64,
    pub state: RobotState,
    pub current_weld: Option<WeldId>,
    pub welds_completed: usize,
    pub time_welding: f64,
    pub time_moving: f64,
    pub time_idle: f64,
}

impl Robot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: RobotId,
        name: impl Into<String>,
        side: Side,
        y_min: f64,
        y_max: f64,
        tcp_speed: f64,
        offset_x: f64,
        reach: f64,
    ) -> Self {
        let center = 0.5 * (y_min + y_max);
        Robot {
            id,
            name: name.into(),
            side,
            y_min,
            y_max,
            tcp_speed,
            offset_x,
            reach,
            current_y: center,
            state: RobotState::Idle,
            current_weld: None,
            welds_completed: 0,
            time_welding: 0.0,
            time_moving: 0.0,
            time_idle: 0.0,
        }
    }

    pub fn workspace_center(&self) -> f64 {
        0.5 * (self.y_min + self.y_max)
    }

    /// True iff `y` lies in the nominal band (reach not considered).
    pub fn in_nominal_range(&self, y: f64) -> bool {
        self.y_min <= y && y <= self.y_max
    }

    /// True iff the robot may hold position `y`: within one reach of the
    /// workspace center. This is the bound used when parking at a fixed Y.
    pub fn can_hold(&self, y: f64) -> bool {
        (y - self.workspace_center()).abs() <= self.reach
    }

    /// True iff the robot may traverse to `y`: inside
    /// `[y_min - reach, y_max + reach]`. Wider than [`Robot::can_hold`].
    pub fn can_visit(&self, y: f64) -> bool {
        self.y_min - self.reach <= y && y <= self.y_max + self.reach
    }
}

/// The linear carriage spanning Y, translating along X, carrying all robots.
#[derive(Debug, Clone, Copy)]
pub struct Gantry {
    pub x: f64,
    /// Maximum X-speed, mm/s.
    pub speed: f64,
    pub x_length: f64,
    pub is_moving: bool,
}

impl Gantry {
    pub fn new(x: f64, speed: f64, x_length: f64) -> Self {
        Gantry {
            x: x.clamp(0.0, x_length),
            speed,
            x_length,
            is_moving: false,
        }
    }
}

/// A commitment for one robot in one window or stop: which weld, the Y to
/// hold, and the X portion executed under this task. For continuous sweeps
/// the portion is the whole weld; a stop pass may cover only a slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub weld: WeldId,
    pub robot: RobotId,
    pub y: f64,
    pub x_start: f64,
    pub x_end: f64,
    /// Set by the planner when zone geometry guarantees this task will queue
    /// on the zone mutex at runtime.
    pub expect_contention: bool,
}

impl Task {
    pub fn len(&self) -> f64 {
        self.x_end - self.x_start
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0.0
    }
}

/// A contiguous span of X during which one continuous sweep executes a group
/// of welds.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub x_start: f64,
    pub x_end: f64,
    pub tasks: Vec<Task>,
}

/// A discrete gantry X position at which robots do all reachable welds.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub x: f64,
    pub tasks: Vec<Task>,
}

/// The planner's output: ordered windows, then ordered stops, over a weld
/// arena that already contains any splitter fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub mode: PlanMode,
    pub windows: Vec<Window>,
    pub stops: Vec<Stop>,
    /// The post-split weld arena the tasks refer to.
    pub welds: Vec<Weld>,
    pub gantry_start_x: f64,
}

impl Plan {
    pub fn total_length(&self) -> f64 {
        self.welds.iter().map(Weld::length).sum()
    }

    pub fn task_count(&self) -> usize {
        self.windows.iter().map(|w| w.tasks.len()).sum::<usize>()
            + self.stops.iter().map(|s| s.tasks.len()).sum::<usize>()
    }
}

/// Structured planning failures. Planning errors fail the whole call; no
/// partial plan is ever returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanningError {
    #[error("weld {weld} at y={y} is out of reach of every {side} robot")]
    UnreachableWeld { weld: WeldId, side: Side, y: f64 },
    #[error("nothing to plan: {0}")]
    EmptyScene(&'static str),
    #[error("invalid geometry for weld {weld}: {reason}")]
    InvalidGeometry { weld: WeldId, reason: String },
    #[error("invalid scene: {0}")]
    InvalidScene(String),
}

/// Recoverable runtime diagnostics surfaced through [`StepOutcome`]. These
/// never abort a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeWarning {
    /// No gantry, robot or weld movement for this many consecutive ticks
    /// while tasks remain open.
    Stall { ticks: usize },
}
impl Display for RuntimeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stall { ticks } => write!(f, "no progress for {ticks} ticks"),
        }
    }
}

/// What one tick produced, for embedders to render or inspect.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Simulated time after this tick, seconds.
    pub time: f64,
    /// Fraction of the total planned length already welded, in `[0, 1]`.
    pub progress: f64,
    /// Robots in `Welding` state at the end of the tick.
    pub welding: Vec<RobotId>,
    /// Welds that reached completion during this tick.
    pub completed_this_tick: Vec<WeldId>,
    pub warnings: Vec<RuntimeWarning>,
    pub is_complete: bool,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn weld_normalizes_reversed_extent() {
        let w = Weld::new(7, 2700.0, 300.0, 150.0, Side::XPlus);
        assert_eq!(w.x_start, 300.0);
        assert_eq!(w.x_end, 2700.0);
        assert_eq!(w.length(), 2400.0);
        assert!(!w.is_complete());
    }

    #[test]
    fn mode_round_trips_through_strings() {
        for mode in [PlanMode::WeldOnMove, PlanMode::StopAndWeld, PlanMode::Hybrid] {
            assert_eq!(mode.to_string().parse::<PlanMode>(), Ok(mode));
        }
        assert!("fast".parse::<PlanMode>().is_err());
    }

    #[test]
    fn reach_bounds_are_wider_for_traversal_than_for_holding() {
        let r = Robot::new(
            RobotId(0),
            "R1",
            Side::XPlus,
            0.0,
            1000.0,
            120.0,
            300.0,
            2000.0,
        );
        assert_eq!(r.workspace_center(), 500.0);
        assert!(r.can_hold(2500.0));
        assert!(!r.can_hold(2501.0));
        assert!(r.can_visit(3000.0));
        assert!(!r.can_visit(3001.0));
    }
}
