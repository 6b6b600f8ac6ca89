//! Link configuration
//!
//! Serializable settings for transmitters and the interface-specific
//! options (RGMII in-band status, RMII pin layout).

use ethphy_core::{ClockRate, SimTime};
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Transmitter timing and end-of-test behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxConfig {
    /// Delay before the first frame, in ns
    pub initial_delay_ns: SimTime,
    /// Time given to the DUT after the last frame, in ns
    pub end_of_test_ns: SimTime,
    /// Wait for frames to come back, then end the run as timed out
    pub do_timeout: bool,
    /// Extend the timeout to cover every frame being looped back
    pub expect_loopback: bool,
    /// Time allowed for the DUT to exit after test-control is raised, in ns
    pub dut_exit_time_ns: SimTime,
    /// Log a dump of every frame sent
    pub verbose: bool,
}

impl Default for TxConfig {
    fn default() -> Self {
        Self::mii()
    }
}

impl TxConfig {
    pub fn mii() -> Self {
        Self {
            initial_delay_ns: 85_000,
            end_of_test_ns: 5_000,
            do_timeout: true,
            expect_loopback: true,
            dut_exit_time_ns: 25_000,
            verbose: false,
        }
    }

    pub fn rgmii() -> Self {
        Self {
            initial_delay_ns: 130_000,
            ..Self::mii()
        }
    }

    pub fn rmii() -> Self {
        Self {
            end_of_test_ns: 10_000,
            ..Self::mii()
        }
    }

    /// Parse from JSON, missing fields taking the MII defaults
    pub fn from_json(json: &str) -> SimResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        if config.do_timeout && config.dut_exit_time_ns == 0 {
            return Err(SimError::ConfigError(
                "dut_exit_time_ns must be non-zero when do_timeout is set".into(),
            ));
        }
        Ok(config)
    }

    /// Same settings without the initial delay or the timeout, for
    /// back-to-back link tests
    pub fn immediate(mut self) -> Self {
        self.initial_delay_ns = 0;
        self.do_timeout = false;
        self
    }

    /// Time to wait for returning traffic once everything is sent.
    ///
    /// Always long enough for a maximum-size frame; when loopback is
    /// expected, two cycles per bit of all traffic sent, doubled for the
    /// clock tick and doubled again for the copy through the application.
    pub fn timeout_ns(&self, bit_time_ns: SimTime, packet_bytes_sent: usize) -> SimTime {
        let mut timeout = bit_time_ns * 1522 * 8;
        if self.expect_loopback {
            let total_bits = packet_bytes_sent as SimTime * 8;
            timeout += 2 * total_bits;
            timeout *= 2;
            timeout *= 2;
        }
        timeout
    }
}

/// RGMII duplex mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Duplex {
    Full,
    Half,
}

/// Link status presented on the RGMII data pins while data-valid is low
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub duplex: Duplex,
    pub link_up: bool,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            duplex: Duplex::Full,
            link_up: true,
        }
    }
}

impl LinkStatus {
    const FULL_DUPLEX: u8 = 0x8;
    const LINK_UP: u8 = 0x1;

    /// Status nibble: duplex | link | speed code
    pub fn nibble(&self, rate: ClockRate) -> u8 {
        let mut status = rate.rgmii_speed_code();
        if self.duplex == Duplex::Full {
            status |= Self::FULL_DUPLEX;
        }
        if self.link_up {
            status |= Self::LINK_UP;
        }
        status
    }

    /// Status nibble replicated into both halves of the data byte
    pub fn byte(&self, rate: ClockRate) -> u8 {
        let nibble = self.nibble(rate);
        (nibble << 4) | nibble
    }
}

/// Which two pins of a 4-bit RMII port carry the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinAssignment {
    /// Bits 0 and 1
    Lower2b,
    /// Bits 2 and 3
    Upper2b,
}

/// Physical layout of the two RMII data lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RmiiPortLayout {
    /// One 4-bit port, two of whose pins are used
    Wide4 { assignment: PinAssignment },
    /// Two 1-bit ports, bit 0 then bit 1
    DualBit,
}

impl Default for RmiiPortLayout {
    fn default() -> Self {
        RmiiPortLayout::Wide4 {
            assignment: PinAssignment::Lower2b,
        }
    }
}

impl RmiiPortLayout {
    /// Number of data pins the layout expects
    pub fn port_count(&self) -> usize {
        match self {
            RmiiPortLayout::Wide4 { .. } => 1,
            RmiiPortLayout::DualBit => 2,
        }
    }

    /// Width of each data pin
    pub fn port_width(&self) -> u32 {
        match self {
            RmiiPortLayout::Wide4 { .. } => 4,
            RmiiPortLayout::DualBit => 1,
        }
    }
}
