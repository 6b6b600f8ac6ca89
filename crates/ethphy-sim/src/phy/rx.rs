//! Generic PHY receiver
//!
//! Samples a line on rising clock edges. A frame starts at the first edge
//! that sees data-valid high and ends at the first edge that sees it low;
//! the gap between one frame's end and the next frame's start is recorded
//! as the received inter-frame gap.
//!
//! Each finished frame is completed, checked, counted and then handed to the
//! [`FrameHandler`]. Structural faults are logged and collected; they never
//! stop the receiver. Received frames are kept for inspection unless
//! [`Receiver::retain_frames`] turns that off for long runs.

use std::cell::RefCell;
use std::rc::Rc;

use ethphy_core::{ClockRate, Frame, FrameDecoder, FrameFault, SimTime};
use tracing::{debug, error, info};

use super::LineDecoder;
use crate::clock::Clock;
use crate::error::SimResult;
use crate::sim::{PinId, SimContext, Task, Wait};

/// Results and control shared between a receiver and its handler
#[derive(Debug, Clone)]
pub struct ReceiverContext {
    name: String,
    rate: ClockRate,
    frames_seen: usize,
    frames: Vec<Frame>,
    faults: Vec<(usize, FrameFault)>,
    errors: Vec<String>,
    stop_requested: bool,
    retain_frames: bool,
}

impl ReceiverContext {
    pub(crate) fn new(name: String, rate: ClockRate) -> Self {
        Self {
            name,
            rate,
            frames_seen: 0,
            frames: Vec::new(),
            faults: Vec::new(),
            errors: Vec::new(),
            stop_requested: false,
            retain_frames: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rate(&self) -> ClockRate {
        self.rate
    }

    /// Frames fully received so far
    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }

    /// Frames kept so far; empty when retention is off
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Structural faults, tagged with the index of the frame they were found in
    pub fn faults(&self) -> &[(usize, FrameFault)] {
        &self.faults
    }

    /// Faults found in one frame
    pub fn faults_of(&self, index: usize) -> Vec<&FrameFault> {
        self.faults
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, f)| f)
            .collect()
    }

    /// Errors reported by the handler
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Record a test failure
    pub fn report_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{}: {}", self.name, message);
        self.errors.push(message);
    }

    /// Ask the receiver to end the simulation once this frame is handled
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// No faults and no handler errors
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty() && self.errors.is_empty()
    }
}

/// Callback for each received frame
pub trait FrameHandler {
    fn on_frame_received(&mut self, frame: &Frame, ctx: &mut ReceiverContext);
}

impl<F> FrameHandler for F
where
    F: FnMut(&Frame, &mut ReceiverContext),
{
    fn on_frame_received(&mut self, frame: &Frame, ctx: &mut ReceiverContext) {
        self(frame, ctx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxPhase {
    WaitIdle,
    Running,
}

/// Receiver task for any line encoding
pub struct Receiver<L: LineDecoder> {
    name: String,
    line: L,
    clock: Clock,
    test_ctrl: Option<PinId>,
    handler: Option<Box<dyn FrameHandler>>,
    verbose: bool,
    phase: RxPhase,
    decoder: Option<FrameDecoder>,
    last_frame_end: Option<SimTime>,
    context: Rc<RefCell<ReceiverContext>>,
}

impl<L: LineDecoder> Receiver<L> {
    pub fn new(line: L, clock: Clock) -> Self {
        let name = format!("{}_rx", line.interface());
        Self {
            context: Rc::new(RefCell::new(ReceiverContext::new(name.clone(), clock.rate()))),
            name,
            line,
            clock,
            test_ctrl: None,
            handler: None,
            verbose: false,
            phase: RxPhase::WaitIdle,
            decoder: None,
            last_frame_end: None,
        }
    }

    /// Stop when this pin is high while the line is idle
    pub fn with_test_ctrl(mut self, pin: PinId) -> Self {
        self.test_ctrl = Some(pin);
        self
    }

    pub fn with_handler(mut self, handler: impl FrameHandler + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Log a dump of every frame received
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Keep every received frame in the context (the default). Counts,
    /// faults and handler errors are recorded either way.
    pub fn retain_frames(self, retain: bool) -> Self {
        self.context.borrow_mut().retain_frames = retain;
        self
    }

    /// Shared view of the received frames and faults
    pub fn context(&self) -> Rc<RefCell<ReceiverContext>> {
        Rc::clone(&self.context)
    }

    fn finish_frame(&mut self, decoder: FrameDecoder, now: SimTime) -> bool {
        let frame = decoder.complete();
        let faults = frame.check(self.clock.rate());

        let mut ctx = self.context.borrow_mut();
        let index = ctx.frames_seen;
        debug!(
            "{}: frame {} received at {}ns ({}, ifg {}ns)",
            self.name, index, now, frame, frame.inter_frame_gap
        );
        if self.verbose {
            debug!("{}", frame.dump());
        }
        for fault in faults {
            error!("{}: frame {}: {}", self.name, index, fault);
            ctx.faults.push((index, fault));
        }

        ctx.frames_seen += 1;
        if let Some(handler) = self.handler.as_mut() {
            handler.on_frame_received(&frame, &mut ctx);
        }
        if ctx.retain_frames {
            ctx.frames.push(frame);
        }
        ctx.stop_requested
    }

    fn on_rising_edge(&mut self, ctx: &mut SimContext<'_>) -> SimResult<Wait> {
        let valid = ctx.sample(self.line.valid_pin())? != 0;
        let now = ctx.now();

        match (self.decoder.take(), valid) {
            (None, true) => {
                let mut decoder = FrameDecoder::new();
                if let Some(end) = self.last_frame_end {
                    decoder.set_inter_frame_gap(now - end);
                }
                self.line.start_frame();
                self.line.sample(ctx, &mut decoder)?;
                self.decoder = Some(decoder);
            }
            (Some(mut decoder), true) => {
                self.line.sample(ctx, &mut decoder)?;
                self.decoder = Some(decoder);
            }
            (Some(mut decoder), false) => {
                self.line.end_frame(&mut decoder);
                self.last_frame_end = Some(now);
                if self.finish_frame(decoder, now) {
                    info!("{}: stopping after {} frames", self.name, self.context.borrow().frames_seen);
                    ctx.terminate();
                    return Ok(Wait::Done);
                }
            }
            (None, false) => {
                if let Some(pin) = self.test_ctrl {
                    if ctx.sample(pin)? != 0 {
                        info!("{}: end of test signalled", self.name);
                        ctx.terminate();
                        return Ok(Wait::Done);
                    }
                }
            }
        }
        Ok(self.clock.edge())
    }
}

impl<L: LineDecoder> Task for Receiver<L> {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, ctx: &mut SimContext<'_>) -> SimResult<Wait> {
        match self.phase {
            RxPhase::WaitIdle => {
                let valid = self.line.valid_pin();
                if ctx.sample(valid)? != 0 {
                    return Ok(Wait::Change(vec![valid]));
                }
                self.phase = RxPhase::Running;
                Ok(self.clock.edge())
            }
            RxPhase::Running => {
                if self.clock.is_low(ctx)? {
                    return Ok(self.clock.edge());
                }
                self.on_rising_edge(ctx)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockSource;
    use crate::config::TxConfig;
    use crate::phy::{MiiPins, MiiRxLine, MiiTxLine, Transmitter};
    use crate::sim::{Simulator, StopReason};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn run(retain: bool) -> ReceiverContext {
        let rate = ClockRate::Clk25MHz;
        let mut sim = Simulator::new();
        let clk = sim.add_pin("clk", 1);
        let source = ClockSource::new(rate, clk);
        let clock = source.clock();
        sim.spawn(Box::new(source));

        let pins = MiiPins::add(&mut sim, "rx");
        let mut rng = StdRng::seed_from_u64(50);
        let bad = Frame::builder().inter_frame_gap(960).corrupt_crc(true).build(&mut rng);
        let good = Frame::builder().inter_frame_gap(960).build(&mut rng);

        let mut tx = Transmitter::new(
            MiiTxLine::new(sim.pins(), pins, rate).unwrap(),
            clock,
            TxConfig::mii().immediate(),
        );
        tx.send([bad, good]).unwrap();
        let rx = Receiver::new(MiiRxLine::new(sim.pins(), pins, rate).unwrap(), clock)
            .retain_frames(retain)
            .with_handler(|_: &Frame, ctx: &mut ReceiverContext| {
                if ctx.frames_seen() == 2 {
                    ctx.request_stop();
                }
            });
        let ctx = rx.context();
        sim.spawn(Box::new(tx));
        sim.spawn(Box::new(rx));
        assert_eq!(sim.run_until(1_000_000).unwrap(), StopReason::Terminated);
        let ctx = ctx.borrow().clone();
        ctx
    }

    #[test]
    fn test_frames_retained_by_default() {
        let ctx = run(true);
        assert_eq!(ctx.frames().len(), 2);
        assert_eq!(ctx.frames_seen(), 2);
    }

    #[test]
    fn test_frames_not_retained() {
        let ctx = run(false);
        assert!(ctx.frames().is_empty());
        assert_eq!(ctx.frames_seen(), 2);
        assert_eq!(ctx.faults().len(), 1);
        assert!(matches!(ctx.faults()[0], (0, FrameFault::CrcMismatch { .. })));
    }
}
