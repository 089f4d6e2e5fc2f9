//! Error types for ReelKit.

use thiserror::Error;

/// Main error type for ReelKit operations.
#[derive(Error, Debug)]
pub enum ReelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("frame {frame} is out of bounds (1..={max})")]
    OutOfBoundsFrame { frame: i64, max: i64 },

    #[error("reader is not open: {0}")]
    ReaderNotOpen(String),

    #[error("unreadable LUT: {0}")]
    UnreadableLut(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("profile error: {0}")]
    Profile(String),

    #[error("effect error: {0}")]
    Effect(String),
}

/// Result type alias for ReelKit operations.
pub type Result<T> = std::result::Result<T, ReelError>;
