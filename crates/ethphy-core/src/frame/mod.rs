//! Ethernet frame as seen on the PHY data pins
//!
//! A [`Frame`] holds every degree of freedom a conformance suite needs,
//! including the illegal ones: preamble length and content, a missing or
//! misplaced SFD, a suppressed or complemented CRC, a dangling alignment
//! nibble and per-nibble error-line assertion. These are plain fields so the
//! same frame can be replayed unchanged over MII, RGMII and RMII.
//!
//! ## Line format
//!
//! ```text
//! preamble (15 x 0x5) | SFD (0xD) | dst(6) src(6) [vlan(4)] len/type(2) payload | CRC (8 nibbles) | [extra]
//!                                   \____________ packet bytes ______________/
//!                                   each byte sent low nibble first
//! ```

mod builder;
mod check;
mod decoder;

pub use builder::{frames_from_json, FrameBuilder, FrameConfig, PayloadSpec};
pub use check::FrameFault;
pub use decoder::FrameDecoder;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Write as _;

use crate::crc;
use crate::rate::SimTime;

/// Length of a MAC address in bytes
pub const MAC_LEN: usize = 6;
/// Length of an 802.1Q tag including the TPID
pub const VLAN_TAG_LEN: usize = 4;
/// Tag protocol identifier that introduces an 802.1Q tag
pub const VLAN_TPID: [u8; 2] = [0x81, 0x00];
/// Length of the length/type field
pub const LEN_TYPE_LEN: usize = 2;
/// Length of the trailing CRC in bytes
pub const CRC_LEN: usize = 4;
/// Largest length/type value that is a length rather than an EtherType
pub const MAX_ETHER_LEN: usize = 1500;
/// Valid preamble nibble
pub const PREAMBLE_NIBBLE: u8 = 0x5;
/// Start-of-frame delimiter nibble
pub const SFD_NIBBLE: u8 = 0xD;
/// Number of preamble nibbles in a legal frame
pub const PREAMBLE_NIBBLES: usize = 15;
/// Smallest payload that needs no padding
pub const MIN_PAYLOAD: usize = 46;
/// Smallest legal packet (headers + payload, no CRC)
pub const MIN_PACKET_BYTES: usize = 2 * MAC_LEN + LEN_TYPE_LEN + MIN_PAYLOAD;
/// Largest legal untagged packet (headers + payload, no CRC)
pub const MAX_PACKET_BYTES: usize = 2 * MAC_LEN + LEN_TYPE_LEN + MAX_ETHER_LEN;

/// One Ethernet frame at the wire level, valid or deliberately broken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Nibbles sent before the SFD
    pub preamble_nibbles: Vec<u8>,
    /// Start-of-frame delimiter, `None` suppresses it
    pub sfd_nibble: Option<u8>,
    /// Destination MAC address
    pub dst_mac: Vec<u8>,
    /// Source MAC address
    pub src_mac: Vec<u8>,
    /// 802.1Q tag (TPID + TCI), `None` and empty are both "untagged"
    pub vlan_tag: Option<Vec<u8>>,
    /// Length/type field
    pub ether_len_type: Vec<u8>,
    /// Payload bytes
    pub payload: Vec<u8>,
    /// Append the CRC word after the payload
    pub send_crc: bool,
    /// Send the bit-complement of the correct CRC
    pub corrupt_crc: bool,
    /// Nibble appended after the CRC to test alignment handling
    pub extra_nibble: Option<u8>,
    /// Gap preceding this frame in ns. Zero on a received frame means
    /// there was no previous frame to measure from.
    pub inter_frame_gap: SimTime,
    /// Nibble indices during which the line error signal is asserted
    pub error_nibbles: BTreeSet<usize>,
    /// The reference model expects the DUT to discard this frame
    pub dropped: bool,
    /// CRC taken from the last four bytes on reception
    pub received_crc: Option<u32>,
    /// Half byte left over when the line went idle
    pub dangling_nibble: Option<u8>,
}

impl Frame {
    /// Frame with no preamble, no SFD and empty fields.
    ///
    /// This is the starting point for reception: the decoder fills it in.
    pub fn blank() -> Self {
        Self {
            preamble_nibbles: Vec::new(),
            sfd_nibble: None,
            dst_mac: Vec::new(),
            src_mac: Vec::new(),
            vlan_tag: None,
            ether_len_type: Vec::new(),
            payload: Vec::new(),
            send_crc: true,
            corrupt_crc: false,
            extra_nibble: None,
            inter_frame_gap: 0,
            error_nibbles: BTreeSet::new(),
            dropped: false,
            received_crc: None,
            dangling_nibble: None,
        }
    }

    /// Start building a frame with legal defaults
    pub fn builder() -> FrameBuilder {
        FrameBuilder::default()
    }

    /// Decode a complete nibble stream, as a receiver would between two idles
    pub fn from_nibbles(nibbles: &[u8]) -> Self {
        let mut decoder = FrameDecoder::new();
        for &nibble in nibbles {
            decoder.push_nibble(nibble);
        }
        decoder.complete()
    }

    /// True if an 802.1Q tag is present and non-empty
    pub fn has_vlan_tag(&self) -> bool {
        self.vlan_tag.as_ref().is_some_and(|tag| !tag.is_empty())
    }

    /// Bytes covered by the CRC: `dst + src + [vlan] + len_type + payload`
    pub fn get_packet_bytes(&self) -> Vec<u8> {
        let vlan = self.vlan_tag.as_deref().unwrap_or(&[]);
        let mut bytes = Vec::with_capacity(
            self.dst_mac.len()
                + self.src_mac.len()
                + vlan.len()
                + self.ether_len_type.len()
                + self.payload.len(),
        );
        bytes.extend_from_slice(&self.dst_mac);
        bytes.extend_from_slice(&self.src_mac);
        bytes.extend_from_slice(vlan);
        bytes.extend_from_slice(&self.ether_len_type);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Correct CRC over the packet bytes
    pub fn expected_crc(&self) -> u32 {
        crc::fcs(&self.get_packet_bytes())
    }

    /// CRC as transmitted, complemented when `corrupt_crc` is set
    pub fn crc(&self) -> u32 {
        let crc = self.expected_crc();
        if self.corrupt_crc {
            !crc
        } else {
            crc
        }
    }

    /// Length/type field as a big-endian value, if it is exactly two bytes
    pub fn ether_len_type_value(&self) -> Option<u16> {
        match self.ether_len_type.as_slice() {
            &[hi, lo] => Some(u16::from_be_bytes([hi, lo])),
            _ => None,
        }
    }

    /// Full nibble stream for the line, in transmission order
    pub fn to_nibbles(&self) -> Vec<u8> {
        let packet_bytes = self.get_packet_bytes();
        let mut nibbles = Vec::with_capacity(
            self.preamble_nibbles.len() + 1 + 2 * packet_bytes.len() + 2 * CRC_LEN + 1,
        );

        nibbles.extend(self.preamble_nibbles.iter().map(|n| n & 0xF));

        if let Some(sfd) = self.sfd_nibble {
            nibbles.push(sfd & 0xF);
        }

        for byte in &packet_bytes {
            nibbles.push(byte & 0xF);
            nibbles.push(byte >> 4);
        }

        if self.send_crc {
            let crc = if self.corrupt_crc {
                !crc::fcs(&packet_bytes)
            } else {
                crc::fcs(&packet_bytes)
            };
            nibbles.extend_from_slice(&crc::crc_nibbles(crc));
        }

        if let Some(extra) = self.extra_nibble {
            nibbles.push(extra & 0xF);
        }

        nibbles
    }

    /// Number of nibbles [`Frame::to_nibbles`] produces
    pub fn nibble_count(&self) -> usize {
        let packet_len = self.dst_mac.len()
            + self.src_mac.len()
            + self.vlan_tag.as_ref().map_or(0, Vec::len)
            + self.ether_len_type.len()
            + self.payload.len();
        self.preamble_nibbles.len()
            + usize::from(self.sfd_nibble.is_some())
            + 2 * packet_len
            + if self.send_crc { 2 * CRC_LEN } else { 0 }
            + usize::from(self.extra_nibble.is_some())
    }

    /// Set the gap preceding this frame
    pub fn set_ifg(&mut self, ifg_ns: SimTime) {
        self.inter_frame_gap = ifg_ns;
    }

    /// Copy of this frame with a different gap
    pub fn with_ifg(mut self, ifg_ns: SimTime) -> Self {
        self.inter_frame_gap = ifg_ns;
        self
    }

    /// Human-readable listing of the header fields and payload
    pub fn dump(&self) -> String {
        fn hex(bytes: &[u8]) -> String {
            bytes
                .iter()
                .map(|b| format!("0x{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ")
        }

        let mut out = String::new();
        let _ = write!(
            out,
            "Packet len={}, dst=[{}], src=[{}], len/type=[{}]",
            self.payload.len(),
            hex(&self.dst_mac),
            hex(&self.src_mac),
            hex(&self.ether_len_type)
        );
        if self.has_vlan_tag() {
            let _ = write!(out, ", vlan=[{}]", hex(self.vlan_tag.as_deref().unwrap_or(&[])));
        }
        out.push_str("\ndata=[\n  ");
        for (i, byte) in self.payload.iter().enumerate() {
            if i > 0 && i % 16 == 0 {
                out.push_str("\n  ");
            }
            let _ = write!(out, "0x{:02x}, ", byte);
        }
        out.push_str("\n]\n");
        if self.send_crc {
            let _ = writeln!(out, "CRC: 0x{:08x}", self.crc());
        }
        out
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::blank()
    }
}

/// Frames compare on their packet content. Line-level attributes (preamble,
/// SFD, gap, error nibbles, CRC flags) are ignored. An absent and an empty
/// VLAN tag are equal; two present tags must match exactly.
impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        let vlan_eq = match (self.has_vlan_tag(), other.has_vlan_tag()) {
            (false, false) => true,
            (true, true) => self.vlan_tag == other.vlan_tag,
            _ => false,
        };

        vlan_eq
            && self.dst_mac == other.dst_mac
            && self.src_mac == other.src_mac
            && self.ether_len_type == other.ether_len_type
            && self.payload == other.payload
    }
}

impl Eq for Frame {}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} preamble nibbles, {} data bytes",
            self.preamble_nibbles.len(),
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_frame() -> Frame {
        let mut rng = StdRng::seed_from_u64(7);
        Frame::builder()
            .dst_mac([0, 1, 2, 3, 4, 5])
            .src_mac([6, 7, 8, 9, 10, 11])
            .payload(PayloadSpec::Step { step: 1, len: 46 })
            .build(&mut rng)
    }

    #[test]
    fn test_packet_bytes_layout() {
        let frame = sample_frame();
        let bytes = frame.get_packet_bytes();
        assert_eq!(bytes.len(), 6 + 6 + 2 + 46);
        assert_eq!(&bytes[..6], &[0, 1, 2, 3, 4, 5]);
        assert_eq!(&bytes[12..14], &[0x00, 46]);
        assert_eq!(bytes[14], 0);
        assert_eq!(bytes[15], 1);
    }

    #[test]
    fn test_nibble_stream() {
        let frame = sample_frame();
        let nibbles = frame.to_nibbles();

        assert_eq!(nibbles.len(), frame.nibble_count());
        assert!(nibbles[..15].iter().all(|&n| n == PREAMBLE_NIBBLE));
        assert_eq!(nibbles[15], SFD_NIBBLE);

        // dst[1] = 0x01 goes low nibble first
        assert_eq!(nibbles[18], 0x1);
        assert_eq!(nibbles[19], 0x0);

        // src[5] = 0x0b
        assert_eq!(nibbles[16 + 22], 0xb);
        assert_eq!(nibbles[16 + 23], 0x0);

        let crc = frame.crc();
        let tail = &nibbles[nibbles.len() - 8..];
        assert_eq!(tail, &crc::crc_nibbles(crc));
    }

    #[test]
    fn test_corrupt_crc_is_complement() {
        let mut frame = sample_frame();
        let good = frame.crc();
        frame.corrupt_crc = true;
        assert_eq!(frame.crc(), !good);
        assert_eq!(frame.expected_crc(), good);
    }

    #[test]
    fn test_fault_flags_shape_stream() {
        let mut frame = sample_frame();
        let full = frame.to_nibbles().len();

        frame.send_crc = false;
        assert_eq!(frame.to_nibbles().len(), full - 8);

        frame.sfd_nibble = None;
        assert_eq!(frame.to_nibbles().len(), full - 9);

        frame.extra_nibble = Some(0x3);
        let nibbles = frame.to_nibbles();
        assert_eq!(nibbles.len(), full - 8);
        assert_eq!(*nibbles.last().unwrap(), 0x3);
    }

    #[test]
    fn test_max_size_frames() {
        let mut rng = StdRng::seed_from_u64(1);
        let untagged = Frame::builder()
            .payload(PayloadSpec::Step { step: 1, len: 1500 })
            .build(&mut rng);
        assert_eq!(untagged.get_packet_bytes().len(), 1514);

        let tagged = Frame::builder()
            .vlan_tag([0x81, 0x00, 0x20, 0x01])
            .payload(PayloadSpec::Step { step: 1, len: 1500 })
            .build(&mut rng);
        assert_eq!(tagged.get_packet_bytes().len(), 1518);
    }

    #[test]
    fn test_equality_ignores_absent_vlan() {
        let a = sample_frame();
        let mut b = a.clone();
        b.vlan_tag = Some(Vec::new());
        b.inter_frame_gap = 12345;
        b.preamble_nibbles.truncate(3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_vlan_mismatch_is_hard() {
        let a = sample_frame();
        let mut b = a.clone();
        b.vlan_tag = Some(vec![0x81, 0x00, 0x00, 0x01]);
        assert_ne!(a, b);

        let mut c = b.clone();
        c.vlan_tag = Some(vec![0x81, 0x00, 0x00, 0x02]);
        assert_ne!(b, c);
    }

    #[test]
    fn test_dump_lists_payload() {
        let frame = sample_frame();
        let dump = frame.dump();
        assert!(dump.starts_with("Packet len=46, dst=[0x00 0x01"));
        assert!(dump.contains("0x0f, \n  0x10"));
        assert!(dump.contains("CRC: 0x"));
    }
}
