/// Error types for the battle-sync library
use thiserror::Error;

/// Result type alias for match synchronization operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while talking to the shared room document
#[derive(Debug, Error)]
pub enum SyncError {
    /// Zenoh-related errors
    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    /// HTTP transport errors from the REST store
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding of the room document failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid room name provided
    #[error("Invalid room name: {0}. Must be non-empty without /, *, $, ?, #, @, ., [, ] or whitespace")]
    InvalidRoomName(String),

    /// The room document does not exist
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Both player slots of the room are taken
    #[error("Room is full: {0}")]
    RoomFull(String),

    /// Operation is reserved to the room owner (player one)
    #[error("Not the room owner")]
    NotRoomOwner,

    /// Remote store refused or failed to answer a request
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Operation timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
