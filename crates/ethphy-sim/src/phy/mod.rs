//! PHY Line Codecs
//!
//! The transmit and receive loops are shared by all three interfaces; what
//! differs is how a frame's nibble stream maps onto pins per clock cycle.
//!
//! | Interface | Data pins       | Per clock cycle                     | Error pin |
//! |-----------|-----------------|-------------------------------------|-----------|
//! | MII       | 4               | one nibble                          | no        |
//! | RGMII     | 8               | one byte (1G) / replicated nibble   | manual    |
//! | RMII      | 2 of 4, or 2x1  | one crumb (2 bits), low crumb first | yes       |
//!
//! "manual" means the pin is only driven through
//! [`LineEncoder::drive_error`]; frame `error_nibbles` are not signalled.
//!
//! A [`LineEncoder`] turns a frame into [`LineWord`]s, one per clock cycle,
//! and knows how to put a word or the idle state on its pins. A
//! [`LineDecoder`] samples its pins once per cycle and feeds nibbles to a
//! [`FrameDecoder`]. [`Transmitter`] and [`Receiver`] do the clocking, gap
//! timing and bookkeeping around them.

pub mod mii;
pub mod rgmii;
pub mod rmii;
mod rx;
mod tx;

pub use mii::{MiiPins, MiiReceiver, MiiRxLine, MiiTransmitter, MiiTxLine};
pub use rgmii::{RgmiiPins, RgmiiReceiver, RgmiiRxLine, RgmiiTransmitter, RgmiiTxLine};
pub use rmii::{RmiiPins, RmiiReceiver, RmiiRxLine, RmiiTransmitter, RmiiTxLine};
pub use rx::{FrameHandler, Receiver, ReceiverContext};
pub use tx::{CompletionHook, Transmitter, TxStats};

use ethphy_core::{Frame, FrameDecoder};

use crate::error::{SimError, SimResult};
use crate::sim::{PinId, SimContext};

/// Pin values for one clock cycle of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineWord {
    /// Value for the data pins
    pub data: u32,
    /// Assert the error line during this cycle
    pub error: bool,
}

impl LineWord {
    pub fn new(data: u32, error: bool) -> Self {
        Self { data, error }
    }
}

/// Transmit side of an interface
pub trait LineEncoder {
    /// Interface name for logs
    fn interface(&self) -> &'static str;

    /// Split a frame into one word per clock cycle. Fails if the frame
    /// cannot be carried at this line's rate.
    fn encode(&self, frame: &Frame) -> SimResult<Vec<LineWord>>;

    /// Assert data-valid and put `word` on the data pins
    fn drive(&self, ctx: &mut SimContext<'_>, word: LineWord) -> SimResult<()>;

    /// Deassert data-valid and return the pins to their idle state
    fn idle(&self, ctx: &mut SimContext<'_>) -> SimResult<()>;

    /// Drive the error line directly, outside frame data
    fn drive_error(&self, _ctx: &mut SimContext<'_>, _value: bool) -> SimResult<()> {
        Err(SimError::ConfigError(format!("{} line has no error pin", self.interface())))
    }
}

/// Receive side of an interface
pub trait LineDecoder {
    /// Interface name for logs
    fn interface(&self) -> &'static str;

    /// Data-valid (or enable) pin
    fn valid_pin(&self) -> PinId;

    /// Called when data-valid rises, before the first sample of a frame
    fn start_frame(&mut self) {}

    /// Sample the data pins for one clock cycle
    fn sample(&mut self, ctx: &SimContext<'_>, decoder: &mut FrameDecoder) -> SimResult<()>;

    /// Called when data-valid falls, before the frame is completed
    fn end_frame(&mut self, _decoder: &mut FrameDecoder) {}
}

/// Nibble stream of a frame with the error flag of each nibble
pub(crate) fn flagged_nibbles(frame: &Frame) -> impl Iterator<Item = (u8, bool)> + '_ {
    frame
        .to_nibbles()
        .into_iter()
        .enumerate()
        .map(move |(i, n)| (n, frame.error_nibbles.contains(&i)))
}
