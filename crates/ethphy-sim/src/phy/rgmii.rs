//! RGMII line: 8 data pins (both clock edges folded into one byte)
//!
//! At 125 MHz the PHY puts a different nibble on each clock edge, which the
//! model carries as one byte per cycle, low nibble first. At 25 MHz and
//! 2.5 MHz the same nibble is presented on both edges, so each cycle carries
//! one nibble replicated into both halves of the byte.
//!
//! While data-valid is low the data pins show the in-band link status
//! (duplex, link, speed), replicated into both nibbles.
//!
//! A byte-wide 1 Gb/s line cannot carry an odd number of nibbles, so such
//! frames are refused when they are queued. The optional error pin is
//! only driven through [`LineEncoder::drive_error`].

use ethphy_core::{ClockRate, Frame, FrameDecoder};
use tracing::warn;

use super::{flagged_nibbles, LineDecoder, LineEncoder, LineWord, Receiver, Transmitter};
use crate::config::LinkStatus;
use crate::error::{SimError, SimResult};
use crate::sim::{PinBank, PinId, SimContext, Simulator};

const INTERFACE: &str = "rgmii";

pub type RgmiiTransmitter = Transmitter<RgmiiTxLine>;
pub type RgmiiReceiver = Receiver<RgmiiRxLine>;

/// Data, data-valid and error pins of one RGMII direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgmiiPins {
    pub data: PinId,
    pub valid: PinId,
    pub error: Option<PinId>,
}

impl RgmiiPins {
    /// Add `<prefix>d` (8 bits), `<prefix>dv` and `<prefix>er` to a simulator
    pub fn add(sim: &mut Simulator, prefix: &str) -> Self {
        Self {
            data: sim.add_pin(format!("{}d", prefix), 8),
            valid: sim.add_pin(format!("{}dv", prefix), 1),
            error: Some(sim.add_pin(format!("{}er", prefix), 1)),
        }
    }

    fn validate(&self, bank: &PinBank, rate: ClockRate) -> SimResult<()> {
        if rate == ClockRate::Clk50MHz {
            return Err(SimError::UnsupportedRate {
                interface: INTERFACE,
                rate,
            });
        }
        bank.require_width(self.data, 8)?;
        bank.require_width(self.valid, 1)?;
        if let Some(error) = self.error {
            bank.require_width(error, 1)?;
        }
        Ok(())
    }
}

fn is_gigabit(rate: ClockRate) -> bool {
    rate == ClockRate::Clk125MHz
}

/// RGMII transmit encoding
#[derive(Debug, Clone)]
pub struct RgmiiTxLine {
    pins: RgmiiPins,
    rate: ClockRate,
    status: LinkStatus,
}

impl RgmiiTxLine {
    pub fn new(
        bank: &PinBank,
        pins: RgmiiPins,
        rate: ClockRate,
        status: LinkStatus,
    ) -> SimResult<Self> {
        pins.validate(bank, rate)?;
        Ok(Self { pins, rate, status })
    }

    /// Byte shown on the data pins while idle
    pub fn status_byte(&self) -> u8 {
        self.status.byte(self.rate)
    }
}

impl LineEncoder for RgmiiTxLine {
    fn interface(&self) -> &'static str {
        INTERFACE
    }

    fn encode(&self, frame: &Frame) -> SimResult<Vec<LineWord>> {
        if !frame.error_nibbles.is_empty() {
            warn!(
                "{}: error nibbles are not signalled, ignoring {}",
                INTERFACE,
                frame.error_nibbles.len()
            );
        }

        let nibbles: Vec<u8> = flagged_nibbles(frame).map(|(n, _)| n).collect();
        if !is_gigabit(self.rate) {
            return Ok(nibbles
                .iter()
                .map(|&n| LineWord::new(u32::from(n | (n << 4)), false))
                .collect());
        }

        if nibbles.len() % 2 != 0 {
            return Err(SimError::ConfigError(format!(
                "{}: {} nibbles cannot be sent as whole bytes at 1Gb/s",
                INTERFACE,
                nibbles.len()
            )));
        }
        Ok(nibbles
            .chunks_exact(2)
            .map(|pair| LineWord::new(u32::from(pair[0] | (pair[1] << 4)), false))
            .collect())
    }

    fn drive(&self, ctx: &mut SimContext<'_>, word: LineWord) -> SimResult<()> {
        ctx.drive(self.pins.valid, 1)?;
        ctx.drive(self.pins.data, word.data)
    }

    fn idle(&self, ctx: &mut SimContext<'_>) -> SimResult<()> {
        ctx.drive(self.pins.data, u32::from(self.status_byte()))?;
        ctx.drive(self.pins.valid, 0)
    }

    fn drive_error(&self, ctx: &mut SimContext<'_>, value: bool) -> SimResult<()> {
        let pin = self
            .pins
            .error
            .ok_or_else(|| SimError::ConfigError(format!("{} line has no error pin", INTERFACE)))?;
        ctx.drive(pin, u32::from(value))
    }
}

/// RGMII receive decoding
#[derive(Debug, Clone)]
pub struct RgmiiRxLine {
    pins: RgmiiPins,
    rate: ClockRate,
}

impl RgmiiRxLine {
    pub fn new(bank: &PinBank, pins: RgmiiPins, rate: ClockRate) -> SimResult<Self> {
        pins.validate(bank, rate)?;
        Ok(Self { pins, rate })
    }
}

impl LineDecoder for RgmiiRxLine {
    fn interface(&self) -> &'static str {
        INTERFACE
    }

    fn valid_pin(&self) -> PinId {
        self.pins.valid
    }

    fn sample(&mut self, ctx: &SimContext<'_>, decoder: &mut FrameDecoder) -> SimResult<()> {
        let byte = (ctx.sample(self.pins.data)? & 0xFF) as u8;
        if is_gigabit(self.rate) {
            decoder.push_byte(byte);
        } else {
            decoder.push_nibble(byte & 0xF);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::ExpectedFrames;
    use crate::clock::ClockSource;
    use crate::config::TxConfig;
    use crate::phy::ReceiverContext;
    use crate::sim::StopReason;
    use ethphy_core::{FrameFault, PayloadSpec};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn run(rate: ClockRate, frames: Vec<Frame>) -> (Simulator, RgmiiPins, Rc<RefCell<ReceiverContext>>) {
        let mut sim = Simulator::new();
        let clk = sim.add_pin("clk", 1);
        let source = ClockSource::new(rate, clk);
        let clock = source.clock();
        sim.spawn(Box::new(source));
        sim.enable_trace();

        let pins = RgmiiPins::add(&mut sim, "rx");
        let line = RgmiiTxLine::new(sim.pins(), pins, rate, LinkStatus::default()).unwrap();
        let mut tx = Transmitter::new(line, clock, TxConfig::rgmii().immediate());
        tx.send(frames.clone()).unwrap();

        let rx = Receiver::new(RgmiiRxLine::new(sim.pins(), pins, rate).unwrap(), clock)
            .with_handler(ExpectedFrames::new(frames));
        let ctx = rx.context();
        sim.spawn(Box::new(tx));
        sim.spawn(Box::new(rx));
        assert_eq!(sim.run_until(10_000_000).unwrap(), StopReason::Terminated);
        (sim, pins, ctx)
    }

    fn frames(rate: ClockRate, seed: u64) -> Vec<Frame> {
        let mut rng = StdRng::seed_from_u64(seed);
        vec![
            Frame::builder().payload_bytes(vec![0u8; 46]).build(&mut rng),
            Frame::builder()
                .payload(PayloadSpec::Step { step: 3, len: 1500 })
                .inter_frame_gap(rate.minimum_ifg_ns())
                .build(&mut rng),
            Frame::builder()
                .vlan_tag([0x81, 0x00, 0x0f, 0xff])
                .num_data_bytes(100)
                .inter_frame_gap(rate.minimum_ifg_ns())
                .build(&mut rng),
        ]
    }

    #[test]
    fn test_roundtrip_gigabit() {
        let rate = ClockRate::Clk125MHz;
        let sent = frames(rate, 20);
        let (_, _, ctx) = run(rate, sent.clone());
        let ctx = ctx.borrow();
        assert_eq!(ctx.frames_seen(), 3);
        assert!(ctx.is_clean(), "faults {:?} errors {:?}", ctx.faults(), ctx.errors());
        assert_eq!(ctx.frames(), sent.as_slice());
        assert_eq!(ctx.frames()[2].inter_frame_gap, 96);
    }

    #[test]
    fn test_roundtrip_100m() {
        let rate = ClockRate::Clk25MHz;
        let sent = frames(rate, 21);
        let (_, _, ctx) = run(rate, sent.clone());
        let ctx = ctx.borrow();
        assert!(ctx.is_clean(), "faults {:?} errors {:?}", ctx.faults(), ctx.errors());
        assert_eq!(ctx.frames(), sent.as_slice());
    }

    #[test]
    fn test_status_restored_when_idle() {
        let rate = ClockRate::Clk125MHz;
        let sent = frames(rate, 22);
        let (sim, pins, _) = run(rate, sent);

        let falls: Vec<_> = sim
            .pins()
            .trace_of(pins.valid)
            .iter()
            .filter(|e| e.value == 0)
            .map(|e| e.time)
            .collect();
        assert_eq!(falls.len(), 3);

        let data = sim.pins().trace_of(pins.data);
        // Idle status is on the pins from the start
        assert_eq!(data[0].time, 0);
        assert_eq!(data[0].value, 0xdd);
        for fall in falls {
            let last = data.iter().filter(|e| e.time <= fall).last().unwrap();
            assert_eq!(last.value, 0xdd, "status not restored at {}ns", fall);
        }
    }

    #[test]
    fn test_replicated_nibbles_at_100m() {
        let mut sim = Simulator::new();
        let pins = RgmiiPins::add(&mut sim, "rx");
        let line = RgmiiTxLine::new(sim.pins(), pins, ClockRate::Clk25MHz, LinkStatus::default()).unwrap();
        let frame = Frame::builder().extra_nibble(0x7).build(&mut StdRng::seed_from_u64(1));
        let words = line.encode(&frame).unwrap();
        assert_eq!(words.len(), frame.nibble_count());
        assert_eq!(words[0].data, 0x55);
        assert_eq!(words[15].data, 0xdd);
        assert_eq!(words.last().unwrap().data, 0x77);
        assert_eq!(line.status_byte(), 0xbb);
    }

    #[test]
    fn test_odd_nibble_count_refused_at_gigabit() {
        let mut sim = Simulator::new();
        let pins = RgmiiPins::add(&mut sim, "rx");
        let line = RgmiiTxLine::new(sim.pins(), pins, ClockRate::Clk125MHz, LinkStatus::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let frame = Frame::builder().extra_nibble(0x7).build(&mut rng);
        let err = line.encode(&frame).unwrap_err();
        assert!(err.is_config_error());

        let even = Frame::builder().build(&mut rng);
        let words = line.encode(&even).unwrap();
        assert_eq!(words.len(), even.nibble_count() / 2);
        assert_eq!(words[7].data, 0xd5);

        let mut decoder = FrameDecoder::new();
        for word in &words {
            decoder.push_byte(word.data as u8);
        }
        let received = decoder.complete();
        assert_eq!(received, even);
        assert!(received.check(ClockRate::Clk125MHz).is_empty());
    }

    #[test]
    fn test_odd_frame_fails_before_sending() {
        let rate = ClockRate::Clk125MHz;
        let mut sim = Simulator::new();
        let clk = sim.add_pin("clk", 1);
        let source = ClockSource::new(rate, clk);
        let pins = RgmiiPins::add(&mut sim, "rx");
        let line = RgmiiTxLine::new(sim.pins(), pins, rate, LinkStatus::default()).unwrap();
        let mut tx = Transmitter::new(line, source.clock(), TxConfig::rgmii().immediate());

        let frame = Frame::builder().extra_nibble(0x1).build(&mut StdRng::seed_from_u64(5));
        assert!(tx.send([frame]).is_err());
        assert_eq!(tx.stats().borrow().frames_sent, 0);
    }

    #[test]
    fn test_drive_error_by_hand() {
        let mut sim = Simulator::new();
        let pins = RgmiiPins::add(&mut sim, "rx");
        let line = RgmiiTxLine::new(sim.pins(), pins, ClockRate::Clk25MHz, LinkStatus::default()).unwrap();
        let error = pins.error.unwrap();

        sim.spawn(Box::new(ErrorPulse { line: line.clone(), high_for: 100, raised: false }));
        sim.enable_trace();
        assert_eq!(sim.run().unwrap(), StopReason::Idle);
        let trace: Vec<_> = sim.pins().trace_of(error).iter().map(|e| (e.time, e.value)).collect();
        assert_eq!(trace, vec![(0, 1), (100, 0)]);

        let without = RgmiiPins { error: None, ..pins };
        let line = RgmiiTxLine::new(sim.pins(), without, ClockRate::Clk25MHz, LinkStatus::default()).unwrap();
        sim.spawn(Box::new(ErrorPulse { line, high_for: 100, raised: false }));
        assert!(matches!(sim.run(), Err(SimError::ConfigError(_))));
    }

    /// Holds the error line high for a while, as a DUT restart test does
    struct ErrorPulse {
        line: RgmiiTxLine,
        high_for: u64,
        raised: bool,
    }

    impl crate::sim::Task for ErrorPulse {
        fn name(&self) -> &str {
            "error_pulse"
        }

        fn step(&mut self, ctx: &mut SimContext<'_>) -> SimResult<crate::sim::Wait> {
            if self.raised {
                self.line.drive_error(ctx, false)?;
                return Ok(crate::sim::Wait::Done);
            }
            self.line.drive_error(ctx, true)?;
            self.raised = true;
            Ok(crate::sim::Wait::Until(ctx.now() + self.high_for))
        }
    }

    #[test]
    fn test_rmii_rate_rejected() {
        let mut sim = Simulator::new();
        let pins = RgmiiPins::add(&mut sim, "rx");
        let err = RgmiiRxLine::new(sim.pins(), pins, ClockRate::Clk50MHz).unwrap_err();
        assert!(matches!(err, SimError::UnsupportedRate { interface: "rgmii", .. }));
    }

    #[test]
    fn test_corrupt_crc_gigabit() {
        let rate = ClockRate::Clk125MHz;
        let mut sent = frames(rate, 23);
        sent[1].corrupt_crc = true;
        let (_, _, ctx) = run(rate, sent);
        let ctx = ctx.borrow();
        assert!(matches!(ctx.faults_of(1).as_slice(), [FrameFault::CrcMismatch { .. }]));
        assert!(ctx.faults_of(0).is_empty());
        assert!(ctx.faults_of(2).is_empty());
    }
}
