//! # Error Types
//!
//! Custom error types for the FBus receiver using `thiserror`.

use thiserror::Error;

/// Main error type for the FBus receiver
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured
    #[error("Serial error: {0}")]
    Serial(String),

    /// The byte link was closed by its transport
    #[error("Byte link closed")]
    LinkClosed,

    /// Outbound queue could not take the whole frame
    #[error("Outbound queue overflow: {dropped} bytes dropped")]
    TxOverflow { dropped: usize },

    /// Frame recorder serialization errors
    #[error("Recorder error: {0}")]
    Recorder(#[from] serde_json::Error),
}

/// Result type alias for the FBus receiver
pub type Result<T> = std::result::Result<T, ReceiverError>;
