//! Error types for the Bellhop client

use thiserror::Error;

/// Errors that can occur when using the Bellhop client
#[derive(Error, Debug)]
pub enum BellhopError {
    /// The configured server URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Connection to the server failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server refused the credentials presented during the handshake
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The underlying transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Failed to serialize/deserialize a frame
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// The client has been shut down
    #[error("Client shut down")]
    Shutdown,
}

/// Result type for Bellhop operations
pub type Result<T> = std::result::Result<T, BellhopError>;
