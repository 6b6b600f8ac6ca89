//! Discrete-Event Pin Simulator
//!
//! A small event-driven kernel in the spirit of an HDL simulator. Tasks
//! (clocks, transmitters, receivers, test stimulus) share a [`PinBank`] and
//! suspend on one of three conditions: an absolute time, a change on a set of
//! pins, or completion.
//!
//! ## Scheduling
//!
//! ```text
//!   timers (time, seq) ──► ready queue ──► step task ──► pin changes
//!        ▲                     ▲                              │
//!        │                     └──── wake pin waiters ◄───────┘
//!        └──────────── Wait::Until ◄──── new wait
//! ```
//!
//! All tasks due at one instant run before time advances. A pin change wakes
//! every task waiting on that pin at the same instant; the task that made
//! the change only registers its own wait afterwards, so it never wakes
//! itself. Steps at one instant are bounded by a delta limit so that two
//! tasks ping-ponging a pin cannot hang the run.

mod pins;
mod task;

pub use pins::{PinBank, PinEvent, PinId};
pub use task::{SimContext, Task, Wait};

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use ethphy_core::SimTime;
use tracing::{debug, trace};

use crate::error::{SimError, SimResult};

/// Index of a task in the simulator
pub type TaskId = usize;

/// Default bound on task steps at a single instant
pub const DEFAULT_DELTA_LIMIT: usize = 10_000;

/// Why [`Simulator::run_until`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A task called [`SimContext::terminate`]
    Terminated,
    /// No task is runnable and no timer is pending
    Idle,
    /// The time limit was reached
    TimeLimit,
}

/// Event-driven simulator
pub struct Simulator {
    now: SimTime,
    pins: PinBank,
    tasks: Vec<Option<Box<dyn Task>>>,
    watches: Vec<Option<Vec<PinId>>>,
    ready: VecDeque<TaskId>,
    timers: BinaryHeap<Reverse<(SimTime, u64, TaskId)>>,
    seq: u64,
    steps_at_now: usize,
    delta_limit: usize,
    terminated: bool,
}

impl Simulator {
    pub fn new() -> Self {
        Self {
            now: 0,
            pins: PinBank::new(),
            tasks: Vec::new(),
            watches: Vec::new(),
            ready: VecDeque::new(),
            timers: BinaryHeap::new(),
            seq: 0,
            steps_at_now: 0,
            delta_limit: DEFAULT_DELTA_LIMIT,
            terminated: false,
        }
    }

    /// Set the maximum number of task steps at one instant
    pub fn with_delta_limit(mut self, limit: usize) -> Self {
        self.delta_limit = limit.max(1);
        self
    }

    /// Current simulated time in ns
    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn add_pin(&mut self, name: impl Into<String>, width: u32) -> PinId {
        self.pins.add(name, width)
    }

    pub fn pins(&self) -> &PinBank {
        &self.pins
    }

    pub fn pins_mut(&mut self) -> &mut PinBank {
        &mut self.pins
    }

    /// Record every pin change from now on
    pub fn enable_trace(&mut self) {
        self.pins.enable_trace();
    }

    /// Add a task; it first runs at the current time
    pub fn spawn(&mut self, task: Box<dyn Task>) -> TaskId {
        let id = self.tasks.len();
        debug!("Spawning task '{}' as {}", task.name(), id);
        self.tasks.push(Some(task));
        self.watches.push(None);
        self.ready.push_back(id);
        id
    }

    /// Number of tasks that have not finished
    pub fn live_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_some()).count()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Run until a task terminates the simulation, nothing is left to do,
    /// or simulated time would pass `limit`.
    pub fn run_until(&mut self, limit: SimTime) -> SimResult<StopReason> {
        loop {
            if self.terminated {
                return Ok(StopReason::Terminated);
            }

            if let Some(id) = self.ready.pop_front() {
                self.steps_at_now += 1;
                if self.steps_at_now > self.delta_limit {
                    return Err(SimError::DeltaLimit {
                        limit: self.delta_limit,
                        time: self.now,
                    });
                }
                self.step_task(id)?;
                continue;
            }

            let next = match self.timers.peek() {
                Some(Reverse((time, _, _))) => *time,
                None => return Ok(StopReason::Idle),
            };
            if next > limit {
                self.now = limit;
                return Ok(StopReason::TimeLimit);
            }

            self.now = next;
            self.steps_at_now = 0;
            while let Some(Reverse((time, _, id))) = self.timers.peek().copied() {
                if time != next {
                    break;
                }
                self.timers.pop();
                self.ready.push_back(id);
            }
        }
    }

    /// Run with no time limit
    pub fn run(&mut self) -> SimResult<StopReason> {
        self.run_until(SimTime::MAX)
    }

    fn step_task(&mut self, id: TaskId) -> SimResult<()> {
        let Some(mut task) = self.tasks.get_mut(id).and_then(Option::take) else {
            return Ok(());
        };

        let mut changed = Vec::new();
        let wait = {
            let mut ctx = SimContext {
                now: self.now,
                pins: &mut self.pins,
                changed: &mut changed,
                terminate: &mut self.terminated,
            };
            task.step(&mut ctx)
        };

        self.wake_waiters(&changed);

        let wait = match wait {
            Ok(wait) => wait,
            Err(e) => {
                debug!("Task '{}' failed at {}ns: {}", task.name(), self.now, e);
                return Err(e);
            }
        };

        trace!("Task '{}' at {}ns waits for {:?}", task.name(), self.now, wait);
        match wait {
            Wait::Until(time) => {
                self.seq += 1;
                self.timers.push(Reverse((time.max(self.now), self.seq, id)));
            }
            Wait::Change(pins) => self.watches[id] = Some(pins),
            Wait::Done => {
                debug!("Task '{}' finished at {}ns", task.name(), self.now);
                return Ok(());
            }
        }
        self.tasks[id] = Some(task);
        Ok(())
    }

    fn wake_waiters(&mut self, changed: &[PinId]) {
        if changed.is_empty() {
            return;
        }
        for (id, watch) in self.watches.iter_mut().enumerate() {
            let woken = watch
                .as_ref()
                .is_some_and(|pins| pins.iter().any(|p| changed.contains(p)));
            if woken {
                *watch = None;
                self.ready.push_back(id);
            }
        }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Toggles a pin a fixed number of times
    struct Toggler {
        pin: PinId,
        interval: SimTime,
        remaining: usize,
    }

    impl Task for Toggler {
        fn name(&self) -> &str {
            "toggler"
        }

        fn step(&mut self, ctx: &mut SimContext<'_>) -> SimResult<Wait> {
            if self.remaining == 0 {
                return Ok(Wait::Done);
            }
            self.remaining -= 1;
            let value = ctx.sample(self.pin)? ^ 1;
            ctx.drive(self.pin, value)?;
            Ok(Wait::Until(ctx.now() + self.interval))
        }
    }

    /// Records the time of every change it sees
    struct Watcher {
        pin: PinId,
        seen: Rc<RefCell<Vec<(SimTime, u32)>>>,
        started: bool,
    }

    impl Task for Watcher {
        fn name(&self) -> &str {
            "watcher"
        }

        fn step(&mut self, ctx: &mut SimContext<'_>) -> SimResult<Wait> {
            if self.started {
                self.seen.borrow_mut().push((ctx.now(), ctx.sample(self.pin)?));
            }
            self.started = true;
            Ok(Wait::Change(vec![self.pin]))
        }
    }

    #[test]
    fn test_change_wakes_waiter_at_same_time() {
        let mut sim = Simulator::new();
        let pin = sim.add_pin("p", 1);
        let seen = Rc::new(RefCell::new(Vec::new()));

        sim.spawn(Box::new(Watcher {
            pin,
            seen: seen.clone(),
            started: false,
        }));
        sim.spawn(Box::new(Toggler {
            pin,
            interval: 10,
            remaining: 3,
        }));

        assert_eq!(sim.run().unwrap(), StopReason::Idle);
        assert_eq!(*seen.borrow(), vec![(0, 1), (10, 0), (20, 1)]);
    }

    #[test]
    fn test_time_limit() {
        let mut sim = Simulator::new();
        let pin = sim.add_pin("p", 1);
        sim.spawn(Box::new(Toggler {
            pin,
            interval: 10,
            remaining: 100,
        }));
        assert_eq!(sim.run_until(35).unwrap(), StopReason::TimeLimit);
        assert_eq!(sim.now(), 35);
        assert_eq!(sim.pins().sample(pin).unwrap(), 0);
    }

    /// Copies one pin onto another, optionally inverted
    struct Echo {
        from: PinId,
        to: PinId,
        invert: bool,
    }

    impl Task for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn step(&mut self, ctx: &mut SimContext<'_>) -> SimResult<Wait> {
            let v = ctx.sample(self.from)?;
            ctx.drive(self.to, if self.invert { v ^ 1 } else { v })?;
            Ok(Wait::Change(vec![self.from]))
        }
    }

    #[test]
    fn test_delta_limit() {
        let mut sim = Simulator::new().with_delta_limit(50);
        let a = sim.add_pin("a", 1);
        let b = sim.add_pin("b", 1);
        sim.spawn(Box::new(Echo {
            from: a,
            to: b,
            invert: true,
        }));
        sim.spawn(Box::new(Echo {
            from: b,
            to: a,
            invert: false,
        }));
        let err = sim.run().unwrap_err();
        assert!(matches!(err, SimError::DeltaLimit { limit: 50, time: 0 }));
    }

    struct Stopper;

    impl Task for Stopper {
        fn name(&self) -> &str {
            "stopper"
        }

        fn step(&mut self, ctx: &mut SimContext<'_>) -> SimResult<Wait> {
            if ctx.now() == 0 {
                return Ok(Wait::Until(500));
            }
            ctx.terminate();
            Ok(Wait::Done)
        }
    }

    #[test]
    fn test_terminate() {
        let mut sim = Simulator::new();
        let pin = sim.add_pin("p", 1);
        sim.spawn(Box::new(Stopper));
        sim.spawn(Box::new(Toggler {
            pin,
            interval: 100,
            remaining: 1000,
        }));
        assert_eq!(sim.run().unwrap(), StopReason::Terminated);
        assert_eq!(sim.now(), 500);
        assert!(sim.is_terminated());
    }

    #[test]
    fn test_trace() {
        let mut sim = Simulator::new();
        let pin = sim.add_pin("p", 1);
        sim.enable_trace();
        sim.spawn(Box::new(Toggler {
            pin,
            interval: 7,
            remaining: 2,
        }));
        sim.run().unwrap();
        let times: Vec<_> = sim.pins().trace_of(pin).iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0, 7]);
    }
}
