//! Simulator error types

use ethphy_core::{ClockRate, PhyError, SimTime};

/// Result type for simulator operations
pub type SimResult<T> = Result<T, SimError>;

/// Errors that stop a simulation or prevent one from being set up.
///
/// Malformed frames on the line are not errors; receivers report them as
/// [`ethphy_core::FrameFault`]s and keep going.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Unknown pin id {0}")]
    UnknownPin(usize),

    #[error("Pin '{pin}' is {actual} bits wide, expected {expected}")]
    PinWidth {
        pin: String,
        expected: u32,
        actual: u32,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{interface} does not run at {rate}")]
    UnsupportedRate {
        interface: &'static str,
        rate: ClockRate,
    },

    #[error("Delta cycle limit of {limit} exceeded at {time}ns")]
    DeltaLimit { limit: usize, time: SimTime },

    #[error("Frame error: {0}")]
    Phy(#[from] PhyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    /// True for errors raised while wiring up a link, before time advances
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SimError::PinWidth { .. }
                | SimError::ConfigError(_)
                | SimError::UnsupportedRate { .. }
                | SimError::Json(_)
        )
    }
}
