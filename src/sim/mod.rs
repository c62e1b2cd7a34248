//! Time-stepped execution of a plan. One tick advances gantry, robots, welds
//! and locks in a fixed order; there is no OS concurrency and no wall-clock
//! time, so identical inputs replay identically.

use bitset_fixed::BitSet;
use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::{
    step_toward, CollisionManager, Gantry, Plan, PlanningError, Robot, RobotId, RobotState,
    RunStatus, Scene, StepOutcome, RuntimeWarning, Task, Weld, WeldId, POSITION_TOL,
};

/// Default tick length, seconds.
pub const DEFAULT_DT: f64 = 0.1;
/// Consecutive no-movement ticks before a stall diagnostic is raised.
pub const DEFAULT_STALL_LIMIT: usize = 100;

/// One robot's claim on a stop task: which task of the current stop, and how
/// much of that pass is already laid.
#[derive(Debug, Clone, Copy)]
struct StopJob {
    task: usize,
    pass_done: f64,
}

/// Per-robot summary of a finished (or interrupted) run.
#[derive(Debug, Clone)]
pub struct RobotReport {
    pub name: String,
    pub welds_completed: usize,
    pub time_welding: f64,
    pub time_moving: f64,
    pub time_idle: f64,
}

impl RobotReport {
    /// Fraction of the run spent welding.
    pub fn utilization(&self, makespan: f64) -> f64 {
        if makespan > 0.0 {
            self.time_welding / makespan
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub makespan: f64,
    pub welds_total: usize,
    pub welds_done: usize,
    pub robots: Vec<RobotReport>,
}

/// The executor. Owns the arenas; every cross-entity reference inside is an
/// id resolved against them.
pub struct Simulator {
    dt: f64,
    time: f64,
    gantry: Gantry,
    robots: Vec<Robot>,
    welds: Vec<Weld>,
    slot_of: FxHashMap<WeldId, usize>,
    plan: Plan,
    collision: CollisionManager,
    window_idx: usize,
    stop_idx: usize,
    /// Which stop the queues below were built for.
    queued_stop: Option<usize>,
    stop_queues: Vec<Vec<usize>>,
    stop_jobs: Vec<Option<StopJob>>,
    completed: BitSet,
    total_length: f64,
    stall_ticks: usize,
    stall_limit: usize,
}

impl Simulator {
    /// Builds an executor for `plan` over a fresh scene instantiation. The
    /// plan must be consistent with the scene's robots: known ids, matching
    /// sides, targets within reach.
    pub fn new(mut plan: Plan, scene: &Scene, dt: f64) -> Result<Self, PlanningError> {
        if !(dt > 0.0) {
            return Err(PlanningError::InvalidScene(format!(
                "tick length {dt} must be positive"
            )));
        }
        scene.validate()?;
        let robots = scene.spawn_robots();
        let collision = CollisionManager::from_scene(scene)?;

        let welds = std::mem::take(&mut plan.welds);
        let mut slot_of = FxHashMap::default();
        for (slot, weld) in welds.iter().enumerate() {
            slot_of.insert(weld.id, slot);
        }

        let check = |task: &Task, holding: bool| -> Result<(), PlanningError> {
            let robot = robots.get(task.robot.0).ok_or_else(|| {
                PlanningError::InvalidScene(format!("plan names unknown robot {}", task.robot))
            })?;
            let slot = slot_of.get(&task.weld).ok_or_else(|| {
                PlanningError::InvalidScene(format!("plan names unknown weld {}", task.weld))
            })?;
            let weld = &welds[*slot];
            if weld.side != robot.side {
                return Err(PlanningError::InvalidScene(format!(
                    "weld {} is on side {} but robot {} is on side {}",
                    weld.id, weld.side, robot.name, robot.side
                )));
            }
            let ok = if holding {
                robot.can_hold(task.y)
            } else {
                robot.can_visit(task.y)
            };
            if !ok {
                return Err(PlanningError::UnreachableWeld {
                    weld: weld.id,
                    side: weld.side,
                    y: task.y,
                });
            }
            Ok(())
        };
        for window in &plan.windows {
            for task in &window.tasks {
                check(task, true)?;
            }
        }
        for stop in &plan.stops {
            for task in &stop.tasks {
                check(task, false)?;
            }
        }

        let mut completed = BitSet::new(welds.len());
        for (slot, weld) in welds.iter().enumerate() {
            if weld.is_complete() {
                completed.set(slot, true);
            }
        }
        let total_length = welds.iter().map(Weld::length).sum();
        let gantry = scene.spawn_gantry(plan.gantry_start_x);
        let nb_robots = robots.len();

        Ok(Simulator {
            dt,
            time: 0.0,
            gantry,
            robots,
            welds,
            slot_of,
            plan,
            collision,
            window_idx: 0,
            stop_idx: 0,
            queued_stop: None,
            stop_queues: vec![vec![]; nb_robots],
            stop_jobs: vec![None; nb_robots],
            completed,
            total_length,
            stall_ticks: 0,
            stall_limit: DEFAULT_STALL_LIMIT,
        })
    }

    pub fn with_stall_limit(mut self, ticks: usize) -> Self {
        self.stall_limit = ticks;
        self
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn gantry(&self) -> &Gantry {
        &self.gantry
    }

    pub fn robots(&self) -> &[Robot] {
        &self.robots
    }

    pub fn welds(&self) -> &[Weld] {
        &self.welds
    }

    pub fn collision(&self) -> &CollisionManager {
        &self.collision
    }

    /// Index of the window currently executing (== window count once the
    /// sweep phase is over).
    pub fn window_index(&self) -> usize {
        self.window_idx
    }

    /// Index of the stop currently executing (== stop count once done).
    pub fn stop_index(&self) -> usize {
        self.stop_idx
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Fraction of the planned length already laid, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total_length > 0.0 {
            self.welds.iter().map(|w| w.done).sum::<f64>() / self.total_length
        } else {
            1.0
        }
    }

    pub fn is_complete(&self) -> bool {
        self.window_idx >= self.plan.windows.len() && self.stop_idx >= self.plan.stops.len()
    }

    fn weld_slot(&self, id: WeldId) -> usize {
        self.slot_of[&id]
    }

    /// Advances the world by one `dt`. Never panics; the only runtime
    /// hiccup, a stalled plan, is reported through the outcome's warnings.
    pub fn step(&mut self) -> StepOutcome {
        let mut out = StepOutcome {
            time: self.time,
            progress: self.progress(),
            welding: vec![],
            completed_this_tick: vec![],
            warnings: vec![],
            is_complete: self.is_complete(),
        };
        if out.is_complete {
            self.gantry.is_moving = false;
            return out;
        }

        let before = self.movement_fingerprint();
        self.time += self.dt;

        if self.window_idx < self.plan.windows.len() {
            self.step_wom(&mut out);
        } else {
            self.step_saw(&mut out);
        }

        if self.movement_fingerprint() == before {
            self.stall_ticks += 1;
            if self.stall_ticks == self.stall_limit {
                warn!("plan stalled: nothing moved for {} ticks", self.stall_ticks);
            }
            if self.stall_ticks >= self.stall_limit {
                out.warnings.push(RuntimeWarning::Stall { ticks: self.stall_ticks });
            }
        } else {
            self.stall_ticks = 0;
        }

        out.time = self.time;
        out.progress = self.progress();
        out.welding = self
            .robots
            .iter()
            .filter(|r| r.state == RobotState::Welding)
            .map(|r| r.id)
            .collect();
        out.is_complete = self.is_complete();
        if out.is_complete {
            self.gantry.is_moving = false;
        }
        out
    }

    /// Ticks until the plan completes or simulated time reaches `max_time`.
    pub fn run_to_completion(&mut self, max_time: f64) -> RunStatus {
        self.run_with_interrupt(max_time, || false)
    }

    /// Same as [`Simulator::run_to_completion`] but also stops between ticks
    /// when `interrupt` says so.
    pub fn run_with_interrupt<I>(&mut self, max_time: f64, interrupt: I) -> RunStatus
    where
        I: Fn() -> bool,
    {
        while !self.is_complete() {
            if self.time >= max_time || interrupt() {
                return RunStatus::Interrupted;
            }
            self.step();
        }
        RunStatus::Completed
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            makespan: self.time,
            welds_total: self.welds.len(),
            welds_done: self.welds.iter().filter(|w| w.is_complete()).count(),
            robots: self
                .robots
                .iter()
                .map(|r| RobotReport {
                    name: r.name.clone(),
                    welds_completed: r.welds_completed,
                    time_welding: r.time_welding,
                    time_moving: r.time_moving,
                    time_idle: r.time_idle,
                })
                .collect(),
        }
    }

    /// Everything that can move in a tick, folded into one comparable value.
    fn movement_fingerprint(&self) -> (u64, u64) {
        let mut pos = self.gantry.x.to_bits() ^ (self.window_idx as u64) ^ (self.stop_idx as u64);
        let mut work = 0_u64;
        for r in &self.robots {
            pos ^= r.current_y.to_bits().rotate_left(r.id.0 as u32);
        }
        for w in &self.welds {
            work ^= w.done.to_bits().rotate_left(w.id.id() as u32 % 63);
        }
        (pos, work)
    }

    /// Charges this tick to each robot's welding/moving/idle counter based
    /// on what the robot is doing this tick. `WaitMutex` counts as idle.
    fn account(&mut self) {
        for robot in self.robots.iter_mut() {
            match robot.state {
                RobotState::Welding => robot.time_welding += self.dt,
                RobotState::MovingY => robot.time_moving += self.dt,
                RobotState::Idle | RobotState::WaitMutex => robot.time_idle += self.dt,
            }
        }
    }

    /// Lays `tcp_speed * dt` of the robot's current weld, bounded by the
    /// weld's length and, at a stop, by the pass portion. Handles completion
    /// bookkeeping and lock release.
    fn advance_weld(&mut self, slot: usize, pass_limit: Option<f64>, out: &mut StepOutcome) {
        let Some(weld_id) = self.robots[slot].current_weld else {
            return;
        };
        let widx = self.weld_slot(weld_id);
        let tcp = self.robots[slot].tcp_speed;

        let mut advance = tcp * self.dt;
        if let Some(job) = self.stop_jobs[slot] {
            if let Some(limit) = pass_limit {
                advance = advance.min((limit - job.pass_done).max(0.0));
            }
        }
        let weld = &mut self.welds[widx];
        weld.done = (weld.done + advance).min(weld.length());

        let mut pass_finished = false;
        if let (Some(job), Some(limit)) = (self.stop_jobs[slot].as_mut(), pass_limit) {
            job.pass_done += advance;
            pass_finished = job.pass_done >= limit - 1e-9;
        }

        let weld_finished = self.welds[widx].is_complete();
        if weld_finished {
            self.completed.set(widx, true);
            out.completed_this_tick.push(weld_id);
            self.robots[slot].welds_completed += 1;
            debug!(
                "robot {} finished weld {} at t={:.1}s",
                self.robots[slot].name, weld_id, self.time
            );
        }
        if weld_finished || pass_finished {
            let id = self.robots[slot].id;
            self.robots[slot].state = RobotState::Idle;
            self.robots[slot].current_weld = None;
            self.stop_jobs[slot] = None;
            self.collision.release(id);
        }
    }

    // ------------------------------------------------------------------
    // weld-on-move
    // ------------------------------------------------------------------

    /// One continuous-sweep tick. The phase order is the contract: start
    /// checks run before the gantry advance so a robot striking its arc this
    /// tick immediately weighs on the sweep speed, and weld progress runs
    /// after the advance so seam and travel stay synchronized.
    fn step_wom(&mut self, out: &mut StepOutcome) {
        let window = self.window_idx;
        let window_start = self.plan.windows[window].x_start;
        let window_end = self.plan.windows[window].x_end.min(self.gantry.x_length);

        // phase 0: bring the gantry to the window before anyone moves
        if self.gantry.x < window_start {
            let target = window_start.min(self.gantry.x_length);
            self.gantry.x = step_toward(self.gantry.x, target, self.gantry.speed * self.dt);
            self.gantry.is_moving = true;
            self.account();
            return;
        }

        // phase 1: robots settle on their hold Y
        let tasks: Vec<Task> = self.plan.windows[window].tasks.clone();
        for task in &tasks {
            let robot = &mut self.robots[task.robot.0];
            if matches!(robot.state, RobotState::Welding | RobotState::WaitMutex) {
                continue;
            }
            if (robot.current_y - task.y).abs() > POSITION_TOL {
                robot.current_y = step_toward(robot.current_y, task.y, robot.tcp_speed * self.dt);
                robot.state = RobotState::MovingY;
            } else {
                robot.current_y = task.y;
                robot.state = RobotState::Idle;
            }
        }

        // phase 2: per-robot start checks, in robot-id order. Each robot
        // strikes as soon as the sweep passes its own start point.
        self.collision.begin_tick();
        for task in &tasks {
            let widx = self.weld_slot(task.weld);
            if self.welds[widx].is_complete() {
                continue;
            }
            let robot = &self.robots[task.robot.0];
            match robot.state {
                RobotState::Welding if robot.current_weld == Some(task.weld) => {
                    self.collision.note_request(robot.id, robot.current_y);
                }
                RobotState::MovingY
                    if self.gantry.x >= task.x_start && self.gantry.x <= task.x_end =>
                {
                    self.collision.note_request(robot.id, task.y);
                }
                _ => {}
            }
        }
        for task in &tasks {
            let widx = self.weld_slot(task.weld);
            if self.welds[widx].done > 0.0 {
                continue;
            }
            let slot = task.robot.0;
            if !matches!(
                self.robots[slot].state,
                RobotState::Idle | RobotState::WaitMutex
            ) {
                continue;
            }
            if self.gantry.x < task.x_start {
                continue;
            }
            let id = self.robots[slot].id;
            if self.collision.try_acquire(id, task.y) {
                self.robots[slot].state = RobotState::Welding;
                self.robots[slot].current_weld = Some(task.weld);
                debug!(
                    "robot {} starts weld {} at x={:.1}",
                    self.robots[slot].name, task.weld, self.gantry.x
                );
            } else {
                self.robots[slot].state = RobotState::WaitMutex;
            }
        }

        self.account();

        // phase 3: the sweep moves at the slowest active welder. With nobody
        // welding it holds for robots still positioning; once everyone is
        // settled it bridges at travel speed to the next pending start,
        // which is always ahead of the gantry at that point.
        let wom_speed = self
            .robots
            .iter()
            .filter(|r| r.state == RobotState::Welding)
            .map(|r| r.tcp_speed)
            .fold(f64::INFINITY, f64::min);
        self.gantry.is_moving = false;
        if wom_speed.is_finite() {
            if self.gantry.x < window_end {
                self.gantry.x = step_toward(self.gantry.x, window_end, wom_speed * self.dt);
                self.gantry.is_moving = true;
            }
        } else if !self.robots.iter().any(|r| r.state == RobotState::MovingY) {
            let next_start = tasks
                .iter()
                .filter(|t| !self.completed[self.weld_slot(t.weld)] && t.x_start > self.gantry.x)
                .map(|t| t.x_start)
                .fold(f64::INFINITY, f64::min);
            if next_start.is_finite() {
                let target = next_start.min(window_end);
                self.gantry.x = step_toward(self.gantry.x, target, self.gantry.speed * self.dt);
                self.gantry.is_moving = true;
            }
        }

        // phase 4: seams grow under every welding torch
        for slot in 0..self.robots.len() {
            if self.robots[slot].state == RobotState::Welding {
                self.advance_weld(slot, None, out);
            }
        }

        // phase 5: the window closes when every one of its welds is done
        let done = self.plan.windows[window]
            .tasks
            .iter()
            .all(|t| self.completed[self.weld_slot(t.weld)]);
        if done {
            debug!("window {} complete at t={:.1}s", window, self.time);
            self.window_idx += 1;
        }
    }

    // ------------------------------------------------------------------
    // stop-and-weld
    // ------------------------------------------------------------------

    /// One discrete-stop tick: traverse with robots held, then work the
    /// stop's queues robot by robot, then move on when everything is drained.
    fn step_saw(&mut self, out: &mut StepOutcome) {
        let stop = self.stop_idx;
        let stop_x = self.plan.stops[stop].x.clamp(0.0, self.gantry.x_length);

        if self.queued_stop != Some(stop) {
            self.build_stop_queues(stop);
        }

        // phase 1: traverse
        if (self.gantry.x - stop_x).abs() > POSITION_TOL {
            self.gantry.x = step_toward(self.gantry.x, stop_x, self.gantry.speed * self.dt);
            self.gantry.is_moving = true;
            self.account();
            return;
        }
        self.gantry.x = stop_x;
        self.gantry.is_moving = false;

        // phase 2: execute. Targets are claimed and requests declared for
        // everyone before any lock is tried, so priority sees all contenders.
        let tasks: Vec<Task> = self.plan.stops[stop].tasks.clone();
        self.collision.begin_tick();
        for slot in 0..self.robots.len() {
            if self.stop_jobs[slot].is_none() {
                self.claim_nearest_task(slot, &tasks);
            }
            let Some(job) = self.stop_jobs[slot] else { continue };
            let robot = &self.robots[slot];
            match robot.state {
                RobotState::Welding => self.collision.note_request(robot.id, robot.current_y),
                _ if (robot.current_y - tasks[job.task].y).abs() > POSITION_TOL => {
                    self.collision.note_request(robot.id, tasks[job.task].y)
                }
                _ => {}
            }
        }

        // what each robot did this tick, charged after the loop: completing
        // a pass demotes the state but the tick was still spent welding
        let mut charges = vec![RobotState::Idle; self.robots.len()];
        for slot in 0..self.robots.len() {
            let Some(job) = self.stop_jobs[slot] else {
                self.robots[slot].state = RobotState::Idle;
                continue;
            };
            let task = tasks[job.task].clone();
            if self.robots[slot].state == RobotState::Welding {
                charges[slot] = RobotState::Welding;
                self.advance_weld(slot, Some(task.len()), out);
                continue;
            }

            let robot = &mut self.robots[slot];
            if (robot.current_y - task.y).abs() > POSITION_TOL {
                robot.current_y = step_toward(robot.current_y, task.y, robot.tcp_speed * self.dt);
                robot.state = RobotState::MovingY;
                charges[slot] = RobotState::MovingY;
                continue;
            }
            robot.current_y = task.y;
            let id = robot.id;
            if self.collision.try_acquire(id, task.y) {
                self.robots[slot].state = RobotState::Welding;
                self.robots[slot].current_weld = Some(task.weld);
                charges[slot] = RobotState::Welding;
                debug!(
                    "robot {} starts weld {} at stop {}",
                    self.robots[slot].name, task.weld, stop
                );
                self.advance_weld(slot, Some(task.len()), out);
            } else {
                self.robots[slot].state = RobotState::WaitMutex;
                charges[slot] = RobotState::WaitMutex;
            }
        }

        for (slot, charge) in charges.iter().enumerate() {
            let robot = &mut self.robots[slot];
            match charge {
                RobotState::Welding => robot.time_welding += self.dt,
                RobotState::MovingY => robot.time_moving += self.dt,
                RobotState::Idle | RobotState::WaitMutex => robot.time_idle += self.dt,
            }
        }

        // phase 3: next stop once every queue and every job is drained
        let drained = self.stop_queues.iter().all(Vec::is_empty)
            && self.stop_jobs.iter().all(Option::is_none);
        if drained {
            debug!("stop {} complete at t={:.1}s", stop, self.time);
            self.stop_idx += 1;
        }
    }

    fn build_stop_queues(&mut self, stop: usize) {
        for queue in self.stop_queues.iter_mut() {
            queue.clear();
        }
        self.stop_jobs.fill(None);
        for (idx, task) in self.plan.stops[stop].tasks.iter().enumerate() {
            let widx = self.slot_of[&task.weld];
            if !self.welds[widx].is_complete() {
                self.stop_queues[task.robot.0].push(idx);
            }
        }
        self.queued_stop = Some(stop);
    }

    /// Pops the pending task nearest to the robot's current Y off its queue.
    fn claim_nearest_task(&mut self, slot: usize, tasks: &[Task]) {
        let y = self.robots[slot].current_y;
        let queue = &mut self.stop_queues[slot];
        if queue.is_empty() {
            return;
        }
        let best = queue
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = (tasks[**a].y - y).abs();
                let db = (tasks[**b].y - y).abs();
                da.partial_cmp(&db)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.cmp(b))
            })
            .map(|(pos, _)| pos);
        if let Some(pos) = best {
            let task = queue.remove(pos);
            self.stop_jobs[slot] = Some(StopJob { task, pass_done: 0.0 });
        }
    }
}
