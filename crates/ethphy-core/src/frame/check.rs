//! Structural validation of a received frame
//!
//! Every check runs on every frame and the results accumulate. A bad frame
//! between two good ones must not stop the good ones being processed, so
//! nothing here returns an error.

use thiserror::Error;

use super::{
    Frame, MAX_ETHER_LEN, MAX_PACKET_BYTES, MIN_PACKET_BYTES, PREAMBLE_NIBBLE, PREAMBLE_NIBBLES,
    SFD_NIBBLE, VLAN_TAG_LEN,
};
use crate::rate::{ClockRate, SimTime};

/// One structural anomaly found in a received frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameFault {
    #[error("Invalid inter-frame gap of {gap_ns}ns (minimum {min_ns}ns)")]
    InterFrameGap { gap_ns: SimTime, min_ns: SimTime },

    #[error("Invalid preamble length of {0} nibbles")]
    PreambleLength(usize),

    #[error("Invalid SFD {}", fmt_nibble(.0))]
    InvalidSfd(Option<u8>),

    #[error("Invalid preamble nibble 0x{0:x}")]
    PreambleValue(u8),

    #[error("Odd number of data nibbles received, dangling nibble 0x{0:x}")]
    DanglingNibble(u8),

    #[error("Length/type field declares {declared} bytes but payload has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Oversized frame of {bytes} bytes (maximum {max})")]
    Oversized { bytes: usize, max: usize },

    #[error("Runt frame of {0} bytes")]
    Runt(usize),

    #[error("No CRC received")]
    MissingCrc,

    #[error("Bad CRC 0x{received:08x}, expected 0x{expected:08x}")]
    CrcMismatch { received: u32, expected: u32 },
}

fn fmt_nibble(nibble: &Option<u8>) -> String {
    match nibble {
        Some(n) => format!("0x{:x}", n),
        None => "(none)".to_string(),
    }
}

impl FrameFault {
    /// Faults in the preamble or SFD rather than the packet itself
    pub fn is_preamble_fault(&self) -> bool {
        matches!(
            self,
            FrameFault::PreambleLength(_) | FrameFault::InvalidSfd(_) | FrameFault::PreambleValue(_)
        )
    }
}

impl Frame {
    /// Run every structural check on a received frame.
    ///
    /// `rate` supplies the minimum inter-frame gap. The gap check is skipped
    /// when `inter_frame_gap` is zero, which marks the first frame of a run.
    pub fn check(&self, rate: ClockRate) -> Vec<FrameFault> {
        let mut faults = Vec::new();

        let min_ifg = rate.minimum_ifg_ns();
        if self.inter_frame_gap != 0 && self.inter_frame_gap < min_ifg {
            faults.push(FrameFault::InterFrameGap {
                gap_ns: self.inter_frame_gap,
                min_ns: min_ifg,
            });
        }

        if self.preamble_nibbles.len() != PREAMBLE_NIBBLES {
            faults.push(FrameFault::PreambleLength(self.preamble_nibbles.len()));
        }

        if self.sfd_nibble != Some(SFD_NIBBLE) {
            faults.push(FrameFault::InvalidSfd(self.sfd_nibble));
        }

        faults.extend(
            self.preamble_nibbles
                .iter()
                .filter(|&&n| n != PREAMBLE_NIBBLE)
                .map(|&n| FrameFault::PreambleValue(n)),
        );

        if let Some(nibble) = self.dangling_nibble {
            faults.push(FrameFault::DanglingNibble(nibble));
        }

        if let Some(declared) = self.ether_len_type_value() {
            let declared = declared as usize;
            if declared <= MAX_ETHER_LEN && declared > self.payload.len() {
                faults.push(FrameFault::LengthMismatch {
                    declared,
                    actual: self.payload.len(),
                });
            }
        }

        let packet_bytes = self.get_packet_bytes();
        let max = if self.has_vlan_tag() {
            MAX_PACKET_BYTES + VLAN_TAG_LEN
        } else {
            MAX_PACKET_BYTES
        };
        if packet_bytes.len() > max {
            faults.push(FrameFault::Oversized {
                bytes: packet_bytes.len(),
                max,
            });
        } else if packet_bytes.len() < MIN_PACKET_BYTES {
            faults.push(FrameFault::Runt(packet_bytes.len()));
        }

        match self.received_crc {
            None => faults.push(FrameFault::MissingCrc),
            Some(received) => {
                let expected = crate::crc::fcs(&packet_bytes);
                if received != expected {
                    faults.push(FrameFault::CrcMismatch { received, expected });
                }
            }
        }

        faults
    }

    /// True if [`Frame::check`] finds nothing
    pub fn is_valid(&self, rate: ClockRate) -> bool {
        self.check(rate).is_empty()
    }
}
