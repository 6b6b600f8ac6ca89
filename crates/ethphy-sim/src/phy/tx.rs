//! Generic PHY transmitter
//!
//! Drives queued frames onto a line, changing pins on falling clock edges.
//! The first frame starts on the first falling edge after the initial delay
//! and one full clock high phase. Every later frame waits
//! `max(1, floor(ifg / period))` idle cycles counted from the edge that
//! deasserted data-valid.
//!
//! Frames are encoded when they are queued, so a frame the line cannot
//! carry is refused by [`Transmitter::send`] before any time passes.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ethphy_core::{ClockRate, Frame, SimTime};
use tracing::{debug, error, info};

use super::{LineEncoder, LineWord};
use crate::clock::Clock;
use crate::config::TxConfig;
use crate::error::SimResult;
use crate::sim::{PinId, SimContext, Task, Wait};

/// What the transmitter does on one falling edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Beat {
    Data(LineWord),
    EndOfFrame,
    Gap,
    Finished,
}

#[derive(Debug)]
struct QueuedFrame {
    frame: Frame,
    words: Vec<LineWord>,
}

#[derive(Debug)]
struct ActiveFrame {
    words: Vec<LineWord>,
    next: usize,
}

/// Hands out one line word per clock cycle across a queue of frames
#[derive(Debug, Default)]
struct FrameScheduler {
    queue: VecDeque<QueuedFrame>,
    active: Option<ActiveFrame>,
    idle_cycles: u64,
    sent_any: bool,
}

impl FrameScheduler {
    fn next_beat<L: LineEncoder>(
        &mut self,
        line: &L,
        rate: ClockRate,
        stats: &mut TxStats,
        verbose: bool,
    ) -> Beat {
        if let Some(active) = self.active.as_mut() {
            if let Some(&word) = active.words.get(active.next) {
                active.next += 1;
                return Beat::Data(word);
            }
            self.active = None;
            self.idle_cycles = 0;
            return Beat::EndOfFrame;
        }

        let Some(queued) = self.queue.front() else {
            return Beat::Finished;
        };

        if self.sent_any {
            self.idle_cycles += 1;
            let required = rate.cycles_in(queued.frame.inter_frame_gap).max(1);
            if self.idle_cycles < required {
                return Beat::Gap;
            }
        }

        let Some(QueuedFrame { frame, words }) = self.queue.pop_front() else {
            return Beat::Finished;
        };
        let Some(&first) = words.first() else {
            return Beat::Gap;
        };

        debug!(
            "{}: sending frame {} ({}, ifg {}ns)",
            line.interface(),
            stats.frames_sent,
            frame,
            frame.inter_frame_gap
        );
        if verbose {
            debug!("{}", frame.dump());
        }

        stats.frames_sent += 1;
        stats.packet_bytes_sent += frame.get_packet_bytes().len();
        self.sent_any = true;
        self.active = Some(ActiveFrame { words, next: 1 });
        Beat::Data(first)
    }
}

/// Counters a transmitter publishes while it runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxStats {
    pub frames_sent: usize,
    pub packet_bytes_sent: usize,
    /// Simulated time at which the last frame finished
    pub all_sent_at: Option<SimTime>,
    /// The end-of-test timeout expired
    pub timed_out: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxPhase {
    Start,
    SyncHigh,
    SyncLow,
    Running,
    EndOfTest,
    Timeout,
    DutExit,
}

/// Called once when the last frame has gone out
pub type CompletionHook<L> = Box<dyn FnMut(&L, &mut SimContext<'_>) -> SimResult<()>>;

/// Transmitter task for any line encoding
pub struct Transmitter<L: LineEncoder> {
    name: String,
    line: L,
    clock: Clock,
    config: TxConfig,
    test_ctrl: Option<PinId>,
    on_complete: Option<CompletionHook<L>>,
    scheduler: FrameScheduler,
    phase: TxPhase,
    stats: Rc<RefCell<TxStats>>,
}

impl<L: LineEncoder> Transmitter<L> {
    pub fn new(line: L, clock: Clock, config: TxConfig) -> Self {
        Self {
            name: format!("{}_tx", line.interface()),
            line,
            clock,
            config,
            test_ctrl: None,
            on_complete: None,
            scheduler: FrameScheduler::default(),
            phase: TxPhase::Start,
            stats: Rc::new(RefCell::new(TxStats::default())),
        }
    }

    /// Raise this pin to tell the DUT the test is over
    pub fn with_test_ctrl(mut self, pin: PinId) -> Self {
        self.test_ctrl = Some(pin);
        self
    }

    /// Run `hook` when every frame has been sent, before the end-of-test
    /// wait. It gets the line, so it can drive the error pin.
    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&L, &mut SimContext<'_>) -> SimResult<()> + 'static,
    {
        self.on_complete = Some(Box::new(hook));
        self
    }

    /// Queue frames, sent in order. Nothing is queued if any frame cannot
    /// be encoded for this line.
    pub fn send(&mut self, frames: impl IntoIterator<Item = Frame>) -> SimResult<()> {
        let encoded = frames
            .into_iter()
            .map(|frame| {
                let words = self.line.encode(&frame)?;
                Ok(QueuedFrame { frame, words })
            })
            .collect::<SimResult<Vec<_>>>()?;
        self.scheduler.queue.extend(encoded);
        Ok(())
    }

    /// Shared view of the transmit counters
    pub fn stats(&self) -> Rc<RefCell<TxStats>> {
        Rc::clone(&self.stats)
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn line(&self) -> &L {
        &self.line
    }

    fn on_falling_edge(&mut self, ctx: &mut SimContext<'_>) -> SimResult<Wait> {
        let beat = {
            let mut stats = self.stats.borrow_mut();
            self.scheduler
                .next_beat(&self.line, self.clock.rate(), &mut stats, self.config.verbose)
        };

        match beat {
            Beat::Data(word) => self.line.drive(ctx, word)?,
            Beat::EndOfFrame => {
                self.line.idle(ctx)?;
                debug!("{}: frame sent at {}ns", self.name, ctx.now());
            }
            Beat::Gap => {}
            Beat::Finished => return self.end_test(ctx),
        }
        Ok(self.clock.edge())
    }

    /// Idle the line and wait out the initial delay
    fn start_test(&mut self, ctx: &mut SimContext<'_>) -> SimResult<Wait> {
        self.line.idle(ctx)?;
        self.phase = TxPhase::SyncHigh;
        Ok(Wait::Until(ctx.now() + self.config.initial_delay_ns))
    }

    fn end_test(&mut self, ctx: &mut SimContext<'_>) -> SimResult<Wait> {
        info!("{}: all frames sent", self.name);
        self.stats.borrow_mut().all_sent_at = Some(ctx.now());
        if let Some(hook) = self.on_complete.as_mut() {
            hook(&self.line, ctx)?;
        }
        self.phase = TxPhase::EndOfTest;
        Ok(Wait::Until(ctx.now() + self.config.end_of_test_ns))
    }

    fn raise_test_ctrl(&self, ctx: &mut SimContext<'_>) -> SimResult<()> {
        if let Some(pin) = self.test_ctrl {
            debug!("{}: signalling end of test", self.name);
            ctx.drive(pin, 1)?;
        }
        Ok(())
    }
}

impl<L: LineEncoder> Task for Transmitter<L> {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, ctx: &mut SimContext<'_>) -> SimResult<Wait> {
        match self.phase {
            TxPhase::Start => self.start_test(ctx),
            TxPhase::SyncHigh => {
                if self.clock.is_high(ctx)? {
                    self.phase = TxPhase::SyncLow;
                }
                Ok(self.clock.edge())
            }
            TxPhase::SyncLow => {
                if self.clock.is_high(ctx)? {
                    return Ok(self.clock.edge());
                }
                self.phase = TxPhase::Running;
                self.on_falling_edge(ctx)
            }
            TxPhase::Running => {
                if self.clock.is_high(ctx)? {
                    return Ok(self.clock.edge());
                }
                self.on_falling_edge(ctx)
            }
            TxPhase::EndOfTest => {
                if !self.config.do_timeout {
                    self.raise_test_ctrl(ctx)?;
                    return Ok(Wait::Done);
                }
                let packet_bytes = self.stats.borrow().packet_bytes_sent;
                let timeout = self.config.timeout_ns(self.clock.bit_time_ns(), packet_bytes);
                debug!("{}: waiting {}ns for the DUT", self.name, timeout);
                self.phase = TxPhase::Timeout;
                Ok(Wait::Until(ctx.now() + timeout))
            }
            TxPhase::Timeout => {
                self.raise_test_ctrl(ctx)?;
                self.phase = TxPhase::DutExit;
                Ok(Wait::Until(ctx.now() + self.config.dut_exit_time_ns))
            }
            TxPhase::DutExit => {
                error!("{}: Test timed out", self.name);
                self.stats.borrow_mut().timed_out = true;
                ctx.terminate();
                Ok(Wait::Done)
            }
        }
    }
}
