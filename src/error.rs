use crate::types::{ChannelType, IndexPath};
use thiserror::Error;

/// Result type for Tesira operations
pub type Result<T> = std::result::Result<T, TesiraError>;

/// Errors that can occur when talking to a Tesira device
#[derive(Error, Debug)]
pub enum TesiraError {
    /// A value was read through the wrong typed accessor
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Variant the caller asked for
        expected: &'static str,
        /// Variant actually held
        found: &'static str,
    },

    /// A device token has no entry in the lookup table
    #[error("Unknown token: {0}")]
    UnknownToken(String),

    /// A required key was absent from a composite value
    #[error("Missing field: {0}")]
    MissingField(String),

    /// The channel type cannot be resolved with the given index path
    #[error("Invalid index path {path} for {channel_type} channel")]
    InvalidIndexPath {
        channel_type: ChannelType,
        path: IndexPath,
    },

    /// Device indices start at 1
    #[error("Index {0} is out of range")]
    IndexOutOfRange(u32),

    /// No block with this instance tag is configured
    #[error("Unknown block: {0}")]
    UnknownBlock(String),

    /// The outbound command queue is gone
    #[error("Connection closed")]
    ConnectionClosed,

    /// Configuration failed validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Invalid or unexpected response from the device
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Console input could not be parsed
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Console command does not apply to the addressed interface
    #[error("{command} is not supported by {target}")]
    UnsupportedCommand {
        command: &'static str,
        target: &'static str,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel receive error
    #[error("Channel error: {0}")]
    ChannelError(String),
}
