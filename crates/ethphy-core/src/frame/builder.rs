//! Frame configuration and builder
//!
//! [`FrameConfig`] is the keyword-style construction surface: every attribute
//! of a [`Frame`] is optional and falls back to a legal default. Random fields
//! (MAC addresses, payload) are drawn from a caller-supplied RNG so that test
//! vectors are reproducible from a seed.
//!
//! ## Example
//!
//! ```rust
//! use ethphy_core::{Frame, PayloadSpec};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let frame = Frame::builder()
//!     .dst_mac([0, 1, 2, 3, 4, 5])
//!     .payload(PayloadSpec::Step { step: 3, len: 50 })
//!     .corrupt_crc(true)
//!     .dropped(true)
//!     .build(&mut rng);
//!
//! assert_eq!(frame.payload.len(), 50);
//! assert_eq!(frame.ether_len_type, vec![0x00, 50]);
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use super::{Frame, MAC_LEN, MAX_ETHER_LEN, MIN_PAYLOAD, PREAMBLE_NIBBLE, PREAMBLE_NIBBLES, SFD_NIBBLE};
use crate::error::{PhyError, PhyResult};
use crate::rate::SimTime;

/// How the payload bytes are produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadSpec {
    /// Uniformly random bytes
    Random { len: usize },
    /// `(step * i) & 0xff` for `i` in `0..len`
    Step { step: u8, len: usize },
    /// Exactly these bytes
    Bytes { data: Vec<u8> },
}

impl PayloadSpec {
    /// Produce the payload bytes
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<u8> {
        match self {
            PayloadSpec::Random { len } => {
                let mut data = vec![0u8; *len];
                rng.fill(&mut data[..]);
                data
            }
            PayloadSpec::Step { step, len } => (0..*len)
                .map(|i| (*step as usize).wrapping_mul(i) as u8)
                .collect(),
            PayloadSpec::Bytes { data } => data.clone(),
        }
    }

    /// Number of bytes generated
    pub fn len(&self) -> usize {
        match self {
            PayloadSpec::Random { len } | PayloadSpec::Step { len, .. } => *len,
            PayloadSpec::Bytes { data } => data.len(),
        }
    }

    /// True if no payload bytes are produced
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PayloadSpec {
    fn default() -> Self {
        PayloadSpec::Random { len: MIN_PAYLOAD }
    }
}

/// Frame construction options.
///
/// Every field has a legal default:
/// - 15 preamble nibbles of `0x5`, SFD `0xD`
/// - random destination and source MAC addresses
/// - untagged, length/type equal to the payload length
/// - 46 random payload bytes
/// - CRC present and correct, no extra nibble, no error nibbles
/// - zero inter-frame gap, not dropped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Number of `0x5` preamble nibbles, ignored if `preamble_nibbles` is set
    pub num_preamble_nibbles: usize,
    /// Explicit preamble content
    pub preamble_nibbles: Option<Vec<u8>>,
    /// SFD nibble, `None` suppresses it
    pub sfd_nibble: Option<u8>,
    /// Destination MAC, random if not given
    pub dst_mac: Option<Vec<u8>>,
    /// Source MAC, random if not given
    pub src_mac: Option<Vec<u8>>,
    /// 802.1Q tag
    pub vlan_tag: Option<Vec<u8>>,
    /// Length/type field, derived from the payload if not given
    pub ether_len_type: Option<Vec<u8>>,
    /// Payload content
    pub payload: PayloadSpec,
    /// Append the CRC word
    pub send_crc: bool,
    /// Complement the CRC word
    pub corrupt_crc: bool,
    /// Explicit alignment nibble after the CRC
    pub extra_nibble: Option<u8>,
    /// Draw the alignment nibble from the RNG
    pub random_extra_nibble: bool,
    /// Gap before this frame in ns
    pub inter_frame_gap: SimTime,
    /// Nibble indices with the error line asserted
    pub error_nibbles: Vec<usize>,
    /// Expect the DUT to discard this frame
    pub dropped: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            num_preamble_nibbles: PREAMBLE_NIBBLES,
            preamble_nibbles: None,
            sfd_nibble: Some(SFD_NIBBLE),
            dst_mac: None,
            src_mac: None,
            vlan_tag: None,
            ether_len_type: None,
            payload: PayloadSpec::default(),
            send_crc: true,
            corrupt_crc: false,
            extra_nibble: None,
            random_extra_nibble: false,
            inter_frame_gap: 0,
            error_nibbles: Vec::new(),
            dropped: false,
        }
    }
}

impl FrameConfig {
    /// Parse a single frame configuration from JSON
    pub fn from_json(json: &str) -> PhyResult<Self> {
        let config: FrameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that nibble-valued fields fit in 4 bits
    pub fn validate(&self) -> PhyResult<()> {
        let nibbles = self
            .preamble_nibbles
            .iter()
            .flatten()
            .chain(self.sfd_nibble.iter())
            .chain(self.extra_nibble.iter());
        for &nibble in nibbles {
            if nibble > 0xF {
                return Err(PhyError::InvalidNibble(nibble as u32));
            }
        }
        if let Some(tag) = &self.vlan_tag {
            if !tag.is_empty() && tag.len() != super::VLAN_TAG_LEN {
                return Err(PhyError::FieldLength {
                    field: "VLAN tag",
                    expected: super::VLAN_TAG_LEN,
                    actual: tag.len(),
                });
            }
        }
        Ok(())
    }

    /// Build the frame, drawing any random fields from `rng`
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Frame {
        let preamble_nibbles = match &self.preamble_nibbles {
            Some(nibbles) => nibbles.clone(),
            None => vec![PREAMBLE_NIBBLE; self.num_preamble_nibbles],
        };

        let dst_mac = match &self.dst_mac {
            Some(mac) => mac.clone(),
            None => random_mac(rng),
        };
        let src_mac = match &self.src_mac {
            Some(mac) => mac.clone(),
            None => random_mac(rng),
        };

        let payload = self.payload.generate(rng);

        let ether_len_type = match &self.ether_len_type {
            Some(len_type) => len_type.clone(),
            None if payload.len() <= MAX_ETHER_LEN => (payload.len() as u16).to_be_bytes().to_vec(),
            None => vec![0x00, 0x00],
        };

        let extra_nibble = match (self.extra_nibble, self.random_extra_nibble) {
            (Some(nibble), _) => Some(nibble & 0xF),
            (None, true) => Some(rng.gen_range(0..16u8)),
            (None, false) => None,
        };

        Frame {
            preamble_nibbles,
            sfd_nibble: self.sfd_nibble,
            dst_mac,
            src_mac,
            vlan_tag: self.vlan_tag.clone(),
            ether_len_type,
            payload,
            send_crc: self.send_crc,
            corrupt_crc: self.corrupt_crc,
            extra_nibble,
            inter_frame_gap: self.inter_frame_gap,
            error_nibbles: self.error_nibbles.iter().copied().collect::<BTreeSet<_>>(),
            dropped: self.dropped,
            received_crc: None,
            dangling_nibble: None,
        }
    }
}

fn random_mac<R: Rng + ?Sized>(rng: &mut R) -> Vec<u8> {
    let mut mac = vec![0u8; MAC_LEN];
    rng.fill(&mut mac[..]);
    mac
}

/// Parse a JSON array of frame configurations and build each frame in order
pub fn frames_from_json<R: Rng + ?Sized>(json: &str, rng: &mut R) -> PhyResult<Vec<Frame>> {
    let configs: Vec<FrameConfig> = serde_json::from_str(json)?;
    debug!("Loaded {} frame configurations", configs.len());
    configs
        .iter()
        .map(|config| {
            config.validate()?;
            Ok(config.build(rng))
        })
        .collect()
}

/// Fluent builder over [`FrameConfig`]
#[derive(Debug, Clone, Default)]
pub struct FrameBuilder {
    config: FrameConfig,
}

impl FrameBuilder {
    /// Start from an existing configuration
    pub fn from_config(config: FrameConfig) -> Self {
        Self { config }
    }

    pub fn num_preamble_nibbles(mut self, count: usize) -> Self {
        self.config.num_preamble_nibbles = count;
        self
    }

    pub fn preamble_nibbles(mut self, nibbles: impl Into<Vec<u8>>) -> Self {
        self.config.preamble_nibbles = Some(nibbles.into());
        self
    }

    pub fn sfd_nibble(mut self, sfd: Option<u8>) -> Self {
        self.config.sfd_nibble = sfd;
        self
    }

    pub fn dst_mac(mut self, mac: impl Into<Vec<u8>>) -> Self {
        self.config.dst_mac = Some(mac.into());
        self
    }

    pub fn src_mac(mut self, mac: impl Into<Vec<u8>>) -> Self {
        self.config.src_mac = Some(mac.into());
        self
    }

    pub fn vlan_tag(mut self, tag: impl Into<Vec<u8>>) -> Self {
        self.config.vlan_tag = Some(tag.into());
        self
    }

    pub fn ether_len_type(mut self, len_type: impl Into<Vec<u8>>) -> Self {
        self.config.ether_len_type = Some(len_type.into());
        self
    }

    pub fn payload(mut self, payload: PayloadSpec) -> Self {
        self.config.payload = payload;
        self
    }

    /// Shorthand for a random payload of `len` bytes
    pub fn num_data_bytes(mut self, len: usize) -> Self {
        self.config.payload = PayloadSpec::Random { len };
        self
    }

    pub fn payload_bytes(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.config.payload = PayloadSpec::Bytes { data: data.into() };
        self
    }

    pub fn send_crc(mut self, send: bool) -> Self {
        self.config.send_crc = send;
        self
    }

    pub fn corrupt_crc(mut self, corrupt: bool) -> Self {
        self.config.corrupt_crc = corrupt;
        self
    }

    pub fn extra_nibble(mut self, nibble: u8) -> Self {
        self.config.extra_nibble = Some(nibble);
        self
    }

    pub fn random_extra_nibble(mut self) -> Self {
        self.config.random_extra_nibble = true;
        self
    }

    pub fn inter_frame_gap(mut self, ifg_ns: SimTime) -> Self {
        self.config.inter_frame_gap = ifg_ns;
        self
    }

    pub fn error_nibbles(mut self, nibbles: impl IntoIterator<Item = usize>) -> Self {
        self.config.error_nibbles = nibbles.into_iter().collect();
        self
    }

    pub fn dropped(mut self, dropped: bool) -> Self {
        self.config.dropped = dropped;
        self
    }

    /// The configuration assembled so far
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn build<R: Rng + ?Sized>(self, rng: &mut R) -> Frame {
        self.config.build(rng)
    }
}
