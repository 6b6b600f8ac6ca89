//! RMII line: 2 data bits per cycle at 50 MHz
//!
//! Each nibble goes out as two crumbs, bits 1:0 first. The two data lines
//! are either two pins of a 4-bit port (lower or upper pair) or two 1-bit
//! ports. An error pin is asserted for both crumbs of every nibble listed in
//! the frame's `error_nibbles` and deasserted everywhere else.
//!
//! If data-valid falls after an odd number of crumbs, the half-filled
//! nibble is handed to the decoder and shows up as a dangling nibble.

use ethphy_core::{ClockRate, Frame, FrameDecoder};

use super::{flagged_nibbles, LineDecoder, LineEncoder, LineWord, Receiver, Transmitter};
use crate::config::{PinAssignment, RmiiPortLayout};
use crate::error::{SimError, SimResult};
use crate::sim::{PinBank, PinId, SimContext, Simulator};

const INTERFACE: &str = "rmii";

pub type RmiiTransmitter = Transmitter<RmiiTxLine>;
pub type RmiiReceiver = Receiver<RmiiRxLine>;

/// Pins of one RMII direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RmiiPins {
    /// One 4-bit port or two 1-bit ports, per the layout
    pub data: Vec<PinId>,
    pub valid: PinId,
    pub error: Option<PinId>,
}

impl RmiiPins {
    /// Add data pins for `layout`, plus `<prefix>dv` and `<prefix>er`
    pub fn add(sim: &mut Simulator, prefix: &str, layout: RmiiPortLayout) -> Self {
        let data = match layout {
            RmiiPortLayout::Wide4 { .. } => vec![sim.add_pin(format!("{}d", prefix), 4)],
            RmiiPortLayout::DualBit => vec![
                sim.add_pin(format!("{}d0", prefix), 1),
                sim.add_pin(format!("{}d1", prefix), 1),
            ],
        };
        Self {
            data,
            valid: sim.add_pin(format!("{}dv", prefix), 1),
            error: Some(sim.add_pin(format!("{}er", prefix), 1)),
        }
    }

    fn validate(&self, bank: &PinBank, layout: RmiiPortLayout, rate: ClockRate) -> SimResult<()> {
        if rate != ClockRate::Clk50MHz {
            return Err(SimError::UnsupportedRate {
                interface: INTERFACE,
                rate,
            });
        }
        if self.data.len() != layout.port_count() {
            return Err(SimError::ConfigError(format!(
                "{:?} needs {} data port(s), got {}",
                layout,
                layout.port_count(),
                self.data.len()
            )));
        }
        for &pin in &self.data {
            bank.require_width(pin, layout.port_width())?;
        }
        bank.require_width(self.valid, 1)?;
        if let Some(error) = self.error {
            bank.require_width(error, 1)?;
        }
        Ok(())
    }
}

/// Split a nibble into its two crumbs, low first
fn crumbs(nibble: u8) -> [u8; 2] {
    [nibble & 0x3, (nibble >> 2) & 0x3]
}

/// RMII transmit encoding
#[derive(Debug, Clone)]
pub struct RmiiTxLine {
    layout: RmiiPortLayout,
    data: Vec<PinId>,
    valid: PinId,
    error: PinId,
}

impl RmiiTxLine {
    /// The transmit side always has an error pin
    pub fn new(bank: &PinBank, pins: RmiiPins, layout: RmiiPortLayout, rate: ClockRate) -> SimResult<Self> {
        pins.validate(bank, layout, rate)?;
        let error = pins
            .error
            .ok_or_else(|| SimError::ConfigError("RMII transmitter needs an error pin".into()))?;
        Ok(Self {
            layout,
            data: pins.data,
            valid: pins.valid,
            error,
        })
    }

    fn drive_crumb(&self, ctx: &mut SimContext<'_>, crumb: u32) -> SimResult<()> {
        match (self.layout, self.data.as_slice()) {
            (RmiiPortLayout::Wide4 { assignment }, [port]) => match assignment {
                PinAssignment::Lower2b => ctx.drive_bits(*port, 0b0011, crumb),
                PinAssignment::Upper2b => ctx.drive_bits(*port, 0b1100, crumb << 2),
            },
            (RmiiPortLayout::DualBit, [bit0, bit1]) => {
                ctx.drive(*bit0, crumb & 1)?;
                ctx.drive(*bit1, (crumb >> 1) & 1)
            }
            _ => Err(SimError::ConfigError(format!("{:?} data ports do not match", self.layout))),
        }
    }
}

impl LineEncoder for RmiiTxLine {
    fn interface(&self) -> &'static str {
        INTERFACE
    }

    fn encode(&self, frame: &Frame) -> SimResult<Vec<LineWord>> {
        Ok(flagged_nibbles(frame)
            .flat_map(|(nibble, error)| crumbs(nibble).map(|c| LineWord::new(u32::from(c), error)))
            .collect())
    }

    fn drive(&self, ctx: &mut SimContext<'_>, word: LineWord) -> SimResult<()> {
        ctx.drive(self.valid, 1)?;
        self.drive_crumb(ctx, word.data)?;
        ctx.drive(self.error, u32::from(word.error))
    }

    fn idle(&self, ctx: &mut SimContext<'_>) -> SimResult<()> {
        ctx.drive(self.valid, 0)?;
        ctx.drive(self.error, 0)
    }

    fn drive_error(&self, ctx: &mut SimContext<'_>, value: bool) -> SimResult<()> {
        ctx.drive(self.error, u32::from(value))
    }
}

/// RMII receive decoding
#[derive(Debug, Clone)]
pub struct RmiiRxLine {
    layout: RmiiPortLayout,
    data: Vec<PinId>,
    valid: PinId,
    error: Option<PinId>,
    nibble: u8,
    crumb_index: usize,
    error_seen: bool,
}

impl RmiiRxLine {
    /// With an error pin, nibbles sampled while it is high are recorded in
    /// the received frame's `error_nibbles`
    pub fn new(bank: &PinBank, pins: RmiiPins, layout: RmiiPortLayout, rate: ClockRate) -> SimResult<Self> {
        pins.validate(bank, layout, rate)?;
        Ok(Self {
            layout,
            data: pins.data,
            valid: pins.valid,
            error: pins.error,
            nibble: 0,
            crumb_index: 0,
            error_seen: false,
        })
    }

    fn sample_crumb(&self, ctx: &SimContext<'_>) -> SimResult<u8> {
        let crumb = match (self.layout, self.data.as_slice()) {
            (RmiiPortLayout::Wide4 { assignment }, [port]) => {
                let value = ctx.sample(*port)?;
                match assignment {
                    PinAssignment::Lower2b => value & 0x3,
                    PinAssignment::Upper2b => (value >> 2) & 0x3,
                }
            }
            (RmiiPortLayout::DualBit, [bit0, bit1]) => {
                (ctx.sample(*bit0)? & 1) | ((ctx.sample(*bit1)? & 1) << 1)
            }
            _ => return Err(SimError::ConfigError(format!("{:?} data ports do not match", self.layout))),
        };
        Ok(crumb as u8)
    }
}

impl LineDecoder for RmiiRxLine {
    fn interface(&self) -> &'static str {
        INTERFACE
    }

    fn valid_pin(&self) -> PinId {
        self.valid
    }

    fn start_frame(&mut self) {
        self.nibble = 0;
        self.crumb_index = 0;
        self.error_seen = false;
    }

    fn sample(&mut self, ctx: &SimContext<'_>, decoder: &mut FrameDecoder) -> SimResult<()> {
        let crumb = self.sample_crumb(ctx)?;
        self.nibble |= crumb << (2 * self.crumb_index);
        if let Some(error) = self.error {
            self.error_seen |= ctx.sample(error)? != 0;
        }

        if self.crumb_index == 1 {
            let index = decoder.nibble_index();
            decoder.push_nibble(self.nibble);
            if self.error_seen {
                decoder.mark_error(index);
            }
            self.nibble = 0;
            self.error_seen = false;
        }
        self.crumb_index ^= 1;
        Ok(())
    }

    fn end_frame(&mut self, decoder: &mut FrameDecoder) {
        if self.crumb_index == 1 {
            if self.error_seen {
                decoder.mark_error(decoder.nibble_index());
            }
            decoder.push_partial_nibble(self.nibble);
        }
        self.start_frame();
    }
}
