//! Comparing received frames against the frames that were sent
//!
//! Frames marked `dropped` are ones the device under test is expected to
//! discard, so they are skipped when matching. Once every expected frame has
//! arrived, or a frame arrives that nothing was expected for, the checker
//! asks the receiver to stop the simulation.

use ethphy_core::Frame;
use tracing::{debug, info};

use crate::phy::{FrameHandler, ReceiverContext};

/// [`FrameHandler`] that checks frames arrive in the order they were sent
#[derive(Debug, Clone)]
pub struct ExpectedFrames {
    frames: Vec<Frame>,
    next: usize,
}

impl ExpectedFrames {
    pub fn new(frames: Vec<Frame>) -> Self {
        let mut checker = Self { frames, next: 0 };
        checker.skip_dropped();
        checker
    }

    /// Index of the next frame expected
    pub fn next_index(&self) -> usize {
        self.next
    }

    /// Every expected frame has been received
    pub fn is_done(&self) -> bool {
        self.next >= self.frames.len()
    }

    fn skip_dropped(&mut self) {
        while self.frames.get(self.next).is_some_and(|f| f.dropped) {
            self.next += 1;
        }
    }
}

impl FrameHandler for ExpectedFrames {
    fn on_frame_received(&mut self, frame: &Frame, ctx: &mut ReceiverContext) {
        let Some(expected) = self.frames.get(self.next) else {
            ctx.report_error("received unexpected packet");
            ctx.request_stop();
            return;
        };

        if frame == expected {
            info!("{}: Received packet {} ok", ctx.name(), self.next);
        } else {
            ctx.report_error(format!("packet {} does not match expected packet", self.next));
            debug!("received:\n{}", frame.dump());
            debug!("expected:\n{}", expected.dump());
        }

        self.next += 1;
        self.skip_dropped();
        if self.is_done() {
            info!("{}: Test done", ctx.name());
            ctx.request_stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockSource;
    use crate::config::TxConfig;
    use crate::phy::{MiiPins, MiiRxLine, MiiTxLine, Receiver, Transmitter};
    use crate::sim::{Simulator, StopReason};
    use ethphy_core::ClockRate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn frames(n: usize, seed: u64) -> Vec<Frame> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| Frame::builder().inter_frame_gap(960).build(&mut rng))
            .collect()
    }

    /// Send `sent` over MII and check against `expected`
    fn run(sent: Vec<Frame>, expected: Vec<Frame>) -> (StopReason, ReceiverContext) {
        let rate = ClockRate::Clk25MHz;
        let mut sim = Simulator::new();
        let clk = sim.add_pin("clk", 1);
        let source = ClockSource::new(rate, clk);
        let clock = source.clock();
        sim.spawn(Box::new(source));

        let pins = MiiPins::add(&mut sim, "rx");
        let mut tx = Transmitter::new(
            MiiTxLine::new(sim.pins(), pins, rate).unwrap(),
            clock,
            TxConfig::mii().immediate(),
        );
        tx.send(sent).unwrap();
        let rx = Receiver::new(MiiRxLine::new(sim.pins(), pins, rate).unwrap(), clock)
            .with_handler(ExpectedFrames::new(expected));
        let ctx = rx.context();
        sim.spawn(Box::new(tx));
        sim.spawn(Box::new(rx));

        let reason = sim.run_until(5_000_000).unwrap();
        let ctx = ctx.borrow().clone();
        (reason, ctx)
    }

    #[test]
    fn test_all_received_stops() {
        let sent = frames(3, 40);
        let (reason, ctx) = run(sent.clone(), sent);
        assert_eq!(reason, StopReason::Terminated);
        assert!(ctx.stop_requested());
        assert!(ctx.is_clean());
        assert_eq!(ctx.frames_seen(), 3);
    }

    #[test]
    fn test_dropped_frames_skipped() {
        let mut expected = frames(4, 41);
        expected[0].dropped = true;
        expected[2].dropped = true;
        let sent = vec![expected[1].clone(), expected[3].clone()];
        let (reason, ctx) = run(sent, expected);
        assert_eq!(reason, StopReason::Terminated);
        assert!(ctx.is_clean(), "{:?}", ctx.errors());
        assert_eq!(ctx.frames_seen(), 2);
    }

    #[test]
    fn test_mismatch_reported() {
        let sent = frames(2, 42);
        let mut expected = sent.clone();
        expected[1].payload[0] ^= 0xFF;
        let (_, ctx) = run(sent, expected);
        assert_eq!(ctx.errors(), ["packet 1 does not match expected packet".to_string()]);
        // The wire itself was fine
        assert!(ctx.faults().is_empty());
    }

    #[test]
    fn test_unexpected_packet() {
        let mut checker = ExpectedFrames::new(Vec::new());
        assert!(checker.is_done());

        let frame = Frame::builder().build(&mut StdRng::seed_from_u64(43));
        let mut ctx = ReceiverContext::new("mii_rx".into(), ClockRate::Clk25MHz);
        checker.on_frame_received(&frame, &mut ctx);
        assert_eq!(ctx.errors(), ["received unexpected packet".to_string()]);
        assert!(ctx.stop_requested());
    }

    #[test]
    fn test_trailing_dropped_frames_complete() {
        let mut expected = frames(3, 44);
        expected[1].dropped = true;
        expected[2].dropped = true;

        let mut checker = ExpectedFrames::new(expected.clone());
        let mut ctx = ReceiverContext::new("mii_rx".into(), ClockRate::Clk25MHz);
        checker.on_frame_received(&expected[0], &mut ctx);
        assert!(checker.is_done());
        assert_eq!(checker.next_index(), 3);
        assert!(ctx.stop_requested());
        assert!(ctx.is_clean());
    }
}
