//! Core error types

use thiserror::Error;

/// Result type for frame model operations
pub type PhyResult<T> = Result<T, PhyError>;

/// Errors raised while building or configuring frames
///
/// These cover malformed *configuration*. Malformed frames on the line are
/// not errors: they are reported as [`crate::FrameFault`]s by `Frame::check`.
#[derive(Error, Debug)]
pub enum PhyError {
    /// A nibble value does not fit in 4 bits
    #[error("Invalid nibble value: 0x{0:x}")]
    InvalidNibble(u32),

    /// A fixed-size header field was given the wrong number of bytes
    #[error("Invalid {field} length: expected {expected} bytes, got {actual}")]
    FieldLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Frame configuration could not be parsed
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PhyError {
    /// Check if this error came from parsing external input
    pub fn is_parse_error(&self) -> bool {
        matches!(self, PhyError::Json(_) | PhyError::ConfigError(_))
    }
}
