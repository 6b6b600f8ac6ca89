//! Link clock source
//!
//! A 50% duty square wave on one pin. The pin starts low at t = 0 and
//! toggles every half period, so rising edges fall at `period/2 + k*period`
//! and falling edges at `k*period` for k >= 1.
//!
//! [`Clock`] is the copyable handle codecs keep to query the level and the
//! derived timing figures; [`ClockSource`] is the task that drives the pin.
//! A [`ClockControl`] can stop and restart the source. A stopped source
//! keeps its phase but leaves the pin alone.

use std::cell::Cell;
use std::rc::Rc;

use ethphy_core::{ClockRate, SimTime};
use tracing::trace;

use crate::error::SimResult;
use crate::sim::{PinId, SimContext, Task, Wait};

/// Handle to a running link clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    rate: ClockRate,
    pin: PinId,
}

impl Clock {
    pub fn new(rate: ClockRate, pin: PinId) -> Self {
        Self { rate, pin }
    }

    pub fn rate(&self) -> ClockRate {
        self.rate
    }

    pub fn pin(&self) -> PinId {
        self.pin
    }

    pub fn period_ns(&self) -> SimTime {
        self.rate.period_ns()
    }

    pub fn bit_time_ns(&self) -> SimTime {
        self.rate.bit_time_ns()
    }

    pub fn minimum_ifg_ns(&self) -> SimTime {
        self.rate.minimum_ifg_ns()
    }

    pub fn is_high(&self, ctx: &SimContext<'_>) -> SimResult<bool> {
        Ok(ctx.sample(self.pin)? != 0)
    }

    pub fn is_low(&self, ctx: &SimContext<'_>) -> SimResult<bool> {
        Ok(!self.is_high(ctx)?)
    }

    /// Wait condition for the next edge of this clock
    pub fn edge(&self) -> Wait {
        Wait::Change(vec![self.pin])
    }
}

/// Shared switch for a [`ClockSource`]
#[derive(Debug, Clone)]
pub struct ClockControl {
    running: Rc<Cell<bool>>,
}

impl ClockControl {
    /// Stop driving the clock pin
    pub fn stop(&self) {
        self.running.set(false);
    }

    pub fn start(&self) {
        self.running.set(true);
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }
}

/// Task toggling a clock pin
#[derive(Debug)]
pub struct ClockSource {
    name: String,
    clock: Clock,
    high: bool,
    control: ClockControl,
}

impl ClockSource {
    pub fn new(rate: ClockRate, pin: PinId) -> Self {
        Self {
            name: format!("clk_{}", rate.name()),
            clock: Clock::new(rate, pin),
            high: false,
            control: ClockControl {
                running: Rc::new(Cell::new(true)),
            },
        }
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Handle to stop and restart this source after it is spawned
    pub fn control(&self) -> ClockControl {
        self.control.clone()
    }
}

impl Task for ClockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, ctx: &mut SimContext<'_>) -> SimResult<Wait> {
        if self.control.is_running() {
            ctx.drive(self.clock.pin, u32::from(self.high))?;
        } else {
            trace!("{}: stopped at {}ns", self.name, ctx.now());
        }
        self.high = !self.high;
        Ok(Wait::Until(ctx.now() + self.clock.rate.half_period_ns()))
    }
}
