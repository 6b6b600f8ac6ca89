//! MII line: 4 data pins, one nibble per clock cycle
//!
//! Runs at 25 MHz (100 Mb/s) or 2.5 MHz (10 Mb/s). There is no error pin on
//! this model; error nibbles requested on a frame are not signalled.

use ethphy_core::{ClockRate, Frame, FrameDecoder};
use tracing::warn;

use super::{flagged_nibbles, LineDecoder, LineEncoder, LineWord, Receiver, Transmitter};
use crate::error::{SimError, SimResult};
use crate::sim::{PinBank, PinId, SimContext, Simulator};

const INTERFACE: &str = "mii";

pub type MiiTransmitter = Transmitter<MiiTxLine>;
pub type MiiReceiver = Receiver<MiiRxLine>;

/// Data and data-valid pins of one MII direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiiPins {
    pub data: PinId,
    pub valid: PinId,
}

impl MiiPins {
    /// Add `<prefix>d` (4 bits) and `<prefix>dv` to a simulator
    pub fn add(sim: &mut Simulator, prefix: &str) -> Self {
        Self {
            data: sim.add_pin(format!("{}d", prefix), 4),
            valid: sim.add_pin(format!("{}dv", prefix), 1),
        }
    }

    fn validate(&self, bank: &PinBank, rate: ClockRate) -> SimResult<()> {
        if !matches!(rate, ClockRate::Clk25MHz | ClockRate::Clk2_5MHz) {
            return Err(SimError::UnsupportedRate {
                interface: INTERFACE,
                rate,
            });
        }
        bank.require_width(self.data, 4)?;
        bank.require_width(self.valid, 1)
    }
}

/// MII transmit encoding
#[derive(Debug, Clone)]
pub struct MiiTxLine {
    pins: MiiPins,
}

impl MiiTxLine {
    pub fn new(bank: &PinBank, pins: MiiPins, rate: ClockRate) -> SimResult<Self> {
        pins.validate(bank, rate)?;
        Ok(Self { pins })
    }
}

impl LineEncoder for MiiTxLine {
    fn interface(&self) -> &'static str {
        INTERFACE
    }

    fn encode(&self, frame: &Frame) -> SimResult<Vec<LineWord>> {
        if !frame.error_nibbles.is_empty() {
            warn!("{}: no error pin, ignoring {} error nibbles", INTERFACE, frame.error_nibbles.len());
        }
        Ok(flagged_nibbles(frame)
            .map(|(nibble, _)| LineWord::new(u32::from(nibble), false))
            .collect())
    }

    fn drive(&self, ctx: &mut SimContext<'_>, word: LineWord) -> SimResult<()> {
        ctx.drive(self.pins.valid, 1)?;
        ctx.drive(self.pins.data, word.data)
    }

    fn idle(&self, ctx: &mut SimContext<'_>) -> SimResult<()> {
        ctx.drive(self.pins.valid, 0)
    }
}

/// MII receive decoding
#[derive(Debug, Clone)]
pub struct MiiRxLine {
    pins: MiiPins,
}

impl MiiRxLine {
    pub fn new(bank: &PinBank, pins: MiiPins, rate: ClockRate) -> SimResult<Self> {
        pins.validate(bank, rate)?;
        Ok(Self { pins })
    }
}

impl LineDecoder for MiiRxLine {
    fn interface(&self) -> &'static str {
        INTERFACE
    }

    fn valid_pin(&self) -> PinId {
        self.pins.valid
    }

    fn sample(&mut self, ctx: &SimContext<'_>, decoder: &mut FrameDecoder) -> SimResult<()> {
        let nibble = ctx.sample(self.pins.data)? & 0xF;
        decoder.push_nibble(nibble as u8);
        Ok(())
    }
}
