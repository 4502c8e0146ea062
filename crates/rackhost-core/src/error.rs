//! Error types for rackhost-core.

use thiserror::Error;

use crate::rack::ConnectionId;

/// Error type for routing graph operations.
///
/// Audio-path functions never return this; they degrade by skipping work.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid rack connection: {0}")]
    InvalidConnection(String),

    #[error("Failed to find connection {0}")]
    ConnectionNotFound(ConnectionId),

    #[error("Failed to remove rack connection {0}")]
    UnlinkFailed(ConnectionId),

    #[error("Invalid port name: {0:?}")]
    InvalidPortName(String),

    #[error("Failed to allocate staging buffers for {frames} frames")]
    BufferAllocation { frames: usize },

    #[error("Staging buffers are in use by the current block")]
    BuffersBusy,

    #[error("Operation requires the {expected} topology")]
    WrongTopology { expected: &'static str },

    #[error("Graph already created")]
    AlreadyCreated,

    #[error("Graph not created")]
    NotCreated,

    #[error("Unsupported operation")]
    Unsupported,
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
