//! Cooperative tasks
//!
//! A task runs until it has to wait, then returns what it is waiting for.
//! The scheduler resumes it when that condition is met. There is no
//! preemption: each `step` runs to completion at a single instant.

use ethphy_core::SimTime;

use super::pins::{PinBank, PinId};
use crate::error::SimResult;

/// What a task waits for before its next step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wait {
    /// Resume at an absolute time
    Until(SimTime),
    /// Resume when any of these pins changes value
    Change(Vec<PinId>),
    /// The task has finished
    Done,
}

/// A simulation thread
pub trait Task {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Run until the next wait
    fn step(&mut self, ctx: &mut SimContext<'_>) -> SimResult<Wait>;
}

/// A task's view of the simulation during one step
pub struct SimContext<'a> {
    pub(crate) now: SimTime,
    pub(crate) pins: &'a mut PinBank,
    pub(crate) changed: &'a mut Vec<PinId>,
    pub(crate) terminate: &'a mut bool,
}

impl<'a> SimContext<'a> {
    /// Current simulated time in ns
    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn sample(&self, pin: PinId) -> SimResult<u32> {
        self.pins.sample(pin)
    }

    pub fn drive(&mut self, pin: PinId, value: u32) -> SimResult<()> {
        if self.pins.drive(pin, value, self.now)? {
            self.changed.push(pin);
        }
        Ok(())
    }

    /// Drive only the bits of `pin` selected by `mask`
    pub fn drive_bits(&mut self, pin: PinId, mask: u32, value: u32) -> SimResult<()> {
        if self.pins.drive_bits(pin, mask, value, self.now)? {
            self.changed.push(pin);
        }
        Ok(())
    }

    /// End the whole simulation after this step
    pub fn terminate(&mut self) {
        *self.terminate = true;
    }
}
