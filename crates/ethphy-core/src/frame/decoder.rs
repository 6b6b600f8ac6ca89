//! Receive-side nibble decoder
//!
//! Nibbles arrive one at a time while data-valid is high. The decoder
//! tracks whether it is still in the preamble, pairs data nibbles into
//! bytes (low nibble first) and files each byte into the next header field.
//! When the line goes idle, [`FrameDecoder::complete`] turns the last four
//! bytes into the received CRC.
//!
//! Only `0xD` ends the preamble. Any other nibble seen before it is kept as
//! preamble content and left for `check` to report, so a corrupted preamble
//! never stops the rest of the frame from being decoded.

use super::{Frame, CRC_LEN, LEN_TYPE_LEN, MAC_LEN, SFD_NIBBLE, VLAN_TAG_LEN, VLAN_TPID};
use crate::crc;

/// Header field the next byte belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    DstMac,
    SrcMac,
    /// Either a VLAN TPID or the length/type field
    TagOrLenType,
    VlanTag,
    LenType,
    Payload,
}

/// Incremental frame decoder
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    frame: Frame,
    in_preamble: bool,
    pending: Option<u8>,
    partial: Option<u8>,
    nibbles_seen: usize,
    field: Field,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            frame: Frame::blank(),
            in_preamble: true,
            pending: None,
            partial: None,
            nibbles_seen: 0,
            field: Field::DstMac,
        }
    }

    /// Still waiting for the SFD
    pub fn in_preamble(&self) -> bool {
        self.in_preamble
    }

    /// Index the next nibble will have
    pub fn nibble_index(&self) -> usize {
        self.nibbles_seen
    }

    /// Record the measured gap before this frame
    pub fn set_inter_frame_gap(&mut self, ifg_ns: u64) {
        self.frame.inter_frame_gap = ifg_ns;
    }

    /// Record that the line error signal was asserted during nibble `index`
    pub fn mark_error(&mut self, index: usize) {
        self.frame.error_nibbles.insert(index);
    }

    /// Frame decoded so far
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Feed one nibble from the line
    pub fn push_nibble(&mut self, nibble: u8) {
        let nibble = nibble & 0xF;
        self.nibbles_seen += 1;

        if self.in_preamble {
            if nibble == SFD_NIBBLE {
                self.frame.sfd_nibble = Some(nibble);
                self.in_preamble = false;
            } else {
                self.frame.preamble_nibbles.push(nibble);
            }
            return;
        }

        match self.pending.take() {
            None => self.pending = Some(nibble),
            Some(low) => self.push_data_byte(low | (nibble << 4)),
        }
    }

    /// Record bits left over when the line went idle part-way through a
    /// nibble. They are reported as the dangling nibble unless a whole
    /// nibble is already pending.
    pub fn push_partial_nibble(&mut self, bits: u8) {
        self.partial = Some(bits & 0xF);
    }

    /// Feed one byte from a byte-wide line, low nibble first
    pub fn push_byte(&mut self, byte: u8) {
        self.push_nibble(byte & 0xF);
        self.push_nibble(byte >> 4);
    }

    fn push_data_byte(&mut self, byte: u8) {
        let frame = &mut self.frame;
        match self.field {
            Field::DstMac => {
                frame.dst_mac.push(byte);
                if frame.dst_mac.len() == MAC_LEN {
                    self.field = Field::SrcMac;
                }
            }
            Field::SrcMac => {
                frame.src_mac.push(byte);
                if frame.src_mac.len() == MAC_LEN {
                    self.field = Field::TagOrLenType;
                }
            }
            Field::TagOrLenType => {
                frame.ether_len_type.push(byte);
                if frame.ether_len_type.len() == LEN_TYPE_LEN {
                    if frame.ether_len_type == VLAN_TPID {
                        frame.vlan_tag = Some(std::mem::take(&mut frame.ether_len_type));
                        self.field = Field::VlanTag;
                    } else {
                        self.field = Field::Payload;
                    }
                }
            }
            Field::VlanTag => {
                let tag = frame.vlan_tag.get_or_insert_with(Vec::new);
                tag.push(byte);
                if tag.len() == VLAN_TAG_LEN {
                    self.field = Field::LenType;
                }
            }
            Field::LenType => {
                frame.ether_len_type.push(byte);
                if frame.ether_len_type.len() == LEN_TYPE_LEN {
                    self.field = Field::Payload;
                }
            }
            Field::Payload => frame.payload.push(byte),
        }
    }

    /// Finish the frame at line idle.
    ///
    /// The last four bytes received are removed from the fields they were
    /// filed into and become `received_crc`. A half byte still pending, or
    /// a partial nibble, is kept in `dangling_nibble` for `check` to report.
    pub fn complete(mut self) -> Frame {
        self.frame.dangling_nibble = self.pending.take().or(self.partial.take());

        let frame = &mut self.frame;
        if frame.get_packet_bytes().len() >= CRC_LEN {
            let mut crc_bytes = [0u8; CRC_LEN];
            for slot in crc_bytes.iter_mut().rev() {
                if let Some(byte) = pop_last_byte(frame) {
                    *slot = byte;
                }
            }
            frame.received_crc = Some(crc::crc_from_bytes(crc_bytes));
        }

        self.frame
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove the last byte received, searching the fields in reverse line order
fn pop_last_byte(frame: &mut Frame) -> Option<u8> {
    if let Some(byte) = frame.payload.pop() {
        return Some(byte);
    }
    if let Some(byte) = frame.ether_len_type.pop() {
        return Some(byte);
    }
    if let Some(byte) = frame.vlan_tag.as_mut().and_then(Vec::pop) {
        return Some(byte);
    }
    if let Some(byte) = frame.src_mac.pop() {
        return Some(byte);
    }
    frame.dst_mac.pop()
}
