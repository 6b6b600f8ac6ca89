//! # Link Clock Rates
//!
//! Every PHY interface is clocked at one of a small set of rates. The rate
//! fixes how many line bits move per clock cycle, and from that the bit time
//! and the minimum legal inter-frame gap (96 bit times).
//!
//! | Rate     | Period | Bits/cycle | Bit time | Min IFG | Used by           |
//! |----------|--------|------------|----------|---------|-------------------|
//! | 125 MHz  | 8 ns   | 8          | 1 ns     | 96 ns   | RGMII 1 Gb/s      |
//! | 25 MHz   | 40 ns  | 4          | 10 ns    | 960 ns  | MII / RGMII 100M  |
//! | 2.5 MHz  | 400 ns | 4          | 100 ns   | 9600 ns | MII / RGMII 10M   |
//! | 50 MHz   | 20 ns  | 2          | 10 ns    | 960 ns  | RMII 100M         |
//!
//! The codecs themselves are rate-agnostic; they only ask the rate for its
//! period and gap.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulated time in nanoseconds
pub type SimTime = u64;

/// Number of bit times in the minimum inter-frame gap
pub const MIN_IFG_BIT_TIMES: u64 = 96;

/// Link clock rate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClockRate {
    /// 125 MHz, 1000 Mb/s RGMII
    Clk125MHz,
    /// 25 MHz, 100 Mb/s MII/RGMII
    #[default]
    Clk25MHz,
    /// 2.5 MHz, 10 Mb/s MII/RGMII
    Clk2_5MHz,
    /// 50 MHz, 100 Mb/s RMII
    Clk50MHz,
}

impl ClockRate {
    /// Clock period in ns
    pub fn period_ns(&self) -> SimTime {
        match self {
            ClockRate::Clk125MHz => 8,
            ClockRate::Clk25MHz => 40,
            ClockRate::Clk2_5MHz => 400,
            ClockRate::Clk50MHz => 20,
        }
    }

    /// Half of the clock period, the interval between edges
    pub fn half_period_ns(&self) -> SimTime {
        self.period_ns() / 2
    }

    /// Line bits transferred per clock cycle
    pub fn bits_per_cycle(&self) -> u64 {
        match self {
            ClockRate::Clk125MHz => 8,
            ClockRate::Clk25MHz | ClockRate::Clk2_5MHz => 4,
            ClockRate::Clk50MHz => 2,
        }
    }

    /// Duration of one line bit in ns
    pub fn bit_time_ns(&self) -> SimTime {
        self.period_ns() / self.bits_per_cycle()
    }

    /// Minimum legal inter-frame gap in ns
    pub fn minimum_ifg_ns(&self) -> SimTime {
        MIN_IFG_BIT_TIMES * self.bit_time_ns()
    }

    /// Minimum legal inter-frame gap in whole clock cycles
    pub fn minimum_ifg_cycles(&self) -> u64 {
        MIN_IFG_BIT_TIMES / self.bits_per_cycle()
    }

    /// Link data rate in Mb/s
    pub fn mbps(&self) -> u64 {
        1000 / self.bit_time_ns()
    }

    /// Speed code presented on the RGMII data pins while data-valid is low
    pub fn rgmii_speed_code(&self) -> u8 {
        match self {
            ClockRate::Clk125MHz => 0x4,
            ClockRate::Clk25MHz => 0x2,
            ClockRate::Clk2_5MHz => 0x0,
            ClockRate::Clk50MHz => 0x1,
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            ClockRate::Clk125MHz => "125MHz",
            ClockRate::Clk25MHz => "25MHz",
            ClockRate::Clk2_5MHz => "2.5MHz",
            ClockRate::Clk50MHz => "50MHz",
        }
    }

    /// Whole clock cycles covered by a gap, rounded down
    pub fn cycles_in(&self, duration_ns: SimTime) -> u64 {
        duration_ns / self.period_ns()
    }
}

impl fmt::Display for ClockRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
