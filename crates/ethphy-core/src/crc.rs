//! CRC-32 Frame Check Sequence
//!
//! Table-driven CRC-32 as used by the IEEE 802.3 frame check sequence.
//!
//! Polynomial 0x04C11DB7, reflected input/output, init 0xFFFFFFFF,
//! xor_out 0xFFFFFFFF. On the wire the FCS is sent least-significant
//! nibble first, which is the natural order of the reflected register.
//!
//! ## Example
//!
//! ```rust
//! use ethphy_core::crc::Crc32;
//!
//! let mut crc = Crc32::new();
//! crc.update(b"123456789");
//! assert_eq!(crc.finalize(), 0xCBF43926);
//! ```

use std::sync::OnceLock;

/// Reflected form of the 802.3 polynomial
const POLY_REFLECTED: u32 = 0xEDB8_8320;

fn table() -> &'static [u32; 256] {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        for i in 0..256u32 {
            let mut crc = i;
            for _ in 0..8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ POLY_REFLECTED;
                } else {
                    crc >>= 1;
                }
            }
            table[i as usize] = crc;
        }
        table
    })
}

/// CRC-32 (IEEE 802.3 / ISO 3309).
///
/// The lookup table is shared between instances, so creating one per frame
/// is cheap.
#[derive(Clone)]
pub struct Crc32 {
    table: &'static [u32; 256],
    value: u32,
}

impl Crc32 {
    /// Create a new CRC-32 register.
    pub fn new() -> Self {
        Self {
            table: table(),
            value: 0xFFFF_FFFF,
        }
    }

    /// Feed more bytes into the register
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            let idx = ((self.value ^ (byte as u32)) & 0xFF) as usize;
            self.value = (self.value >> 8) ^ self.table[idx];
        }
    }

    /// CRC of everything fed so far
    pub fn finalize(&self) -> u32 {
        self.value ^ 0xFFFF_FFFF
    }

    /// CRC of a whole buffer
    pub fn compute(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.finalize()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame check sequence over the packet bytes (destination MAC through payload).
pub fn fcs(packet_bytes: &[u8]) -> u32 {
    Crc32::compute(packet_bytes)
}

/// Split a CRC word into the 8 nibbles sent on the line, least significant first.
pub fn crc_nibbles(crc: u32) -> [u8; 8] {
    let mut nibbles = [0u8; 8];
    for (i, nibble) in nibbles.iter_mut().enumerate() {
        *nibble = ((crc >> (4 * i)) & 0xF) as u8;
    }
    nibbles
}

/// Reassemble a CRC word from the 4 trailing bytes received on the line.
pub fn crc_from_bytes(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_known_values() {
        let checksum = Crc32::compute(b"123456789");
        assert_eq!(
            checksum, 0xCBF43926,
            "CRC-32 of '123456789' should be 0xCBF43926, got 0x{:08X}",
            checksum
        );
    }

    #[test]
    fn test_crc32_empty() {
        assert_eq!(Crc32::compute(b""), 0x00000000);
    }

    #[test]
    fn test_crc32_incremental() {
        let mut crc = Crc32::new();
        crc.update(b"Hello, ");
        crc.update(b"world!");
        assert_eq!(crc.finalize(), Crc32::compute(b"Hello, world!"));
        assert_eq!(crc.finalize(), 0xEBE6C6E6);
    }

    #[test]
    fn test_fcs_of_frame_bytes() {
        // Appending the FCS little-endian leaves the CRC-32 residue
        let data = b"test data";
        let mut with_fcs = data.to_vec();
        with_fcs.extend_from_slice(&fcs(data).to_le_bytes());
        assert_eq!(Crc32::compute(&with_fcs), 0x2144_DF1C);
    }

    #[test]
    fn test_nibble_order() {
        let nibbles = crc_nibbles(0x1234_ABCD);
        assert_eq!(nibbles, [0xD, 0xC, 0xB, 0xA, 0x4, 0x3, 0x2, 0x1]);

        // Pairing nibbles low-first into bytes must give the little-endian word back
        let bytes = [
            nibbles[0] | (nibbles[1] << 4),
            nibbles[2] | (nibbles[3] << 4),
            nibbles[4] | (nibbles[5] << 4),
            nibbles[6] | (nibbles[7] << 4),
        ];
        assert_eq!(crc_from_bytes(bytes), 0x1234_ABCD);
    }
}
