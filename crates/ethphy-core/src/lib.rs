//! Ethernet PHY Line Model
//!
//! This crate holds everything about an Ethernet frame that does not depend
//! on how it is clocked onto pins:
//!
//! - **Frame model**: [`Frame`], with every field a conformance suite may
//!   want to break (preamble, SFD, CRC, alignment nibble, error nibbles)
//! - **Construction**: [`FrameBuilder`] / [`FrameConfig`], JSON test vectors
//! - **Nibble codec**: [`Frame::to_nibbles`] and the incremental
//!   [`FrameDecoder`]
//! - **Validation**: [`Frame::check`] returning [`FrameFault`]s
//! - **CRC-32**: [`crc::Crc32`]
//! - **Link rates**: [`ClockRate`]
//!
//! The pin-level MII, RGMII and RMII codecs live in `ethphy-sim`.
//!
//! # Example
//!
//! ```rust
//! use ethphy_core::{ClockRate, Frame};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! let sent = Frame::builder().num_data_bytes(64).corrupt_crc(true).build(&mut rng);
//!
//! let received = Frame::from_nibbles(&sent.to_nibbles());
//! assert_eq!(received, sent);
//! assert_eq!(received.check(ClockRate::Clk25MHz).len(), 1);
//! ```

pub mod crc;
pub mod error;
pub mod frame;
pub mod rate;

pub use crc::Crc32;
pub use error::{PhyError, PhyResult};
pub use frame::{frames_from_json, Frame, FrameBuilder, FrameConfig, FrameDecoder, FrameFault, PayloadSpec};
pub use rate::{ClockRate, SimTime, MIN_IFG_BIT_TIMES};
