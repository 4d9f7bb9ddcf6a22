//! # Error Types
//!
//! Custom error types for the UAV commander using `thiserror`.

use thiserror::Error;

/// Envelope integrity failures reported by the framing decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Fewer bytes than the header or the declared length requires
    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Checksum does not cover the received bytes
    #[error("checksum mismatch: computed 0x{computed:08X}, received 0x{received:08X}")]
    ChecksumMismatch { computed: u32, received: u32 },

    /// Payload too large to fit one datagram once framed
    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    Oversized { size: usize, max: usize },
}

/// Structural failures while decoding a verified payload
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Bytes do not form a valid message (bad syntax, missing required fields)
    #[error("malformed message: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Malformed(err.to_string())
    }
}

/// Main error type for the UAV commander
#[derive(Debug, Error)]
pub enum CommanderError {
    /// Framing errors
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    /// Message decoding errors
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Gateway call failed to reach or execute
    #[error("gateway transport error: {0}")]
    Transport(String),

    /// Gateway explicitly refused the request
    #[error("gateway did not accept {0}")]
    NotAccepted(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the UAV commander
pub type Result<T> = std::result::Result<T, CommanderError>;
