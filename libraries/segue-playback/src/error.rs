//! Error types for playback management

use thiserror::Error;

/// Failure to bind a track to a playback buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Locator does not resolve to any source
    #[error("Track source not found: {0}")]
    NotFound(String),

    /// Source exists but could not be read
    #[error("Track source unreadable: {locator}: {reason}")]
    Unreadable { locator: String, reason: String },

    /// Source was read but is not a decodable audio format
    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),
}

/// Underlying audio session could not be (de)activated
///
/// Never fatal: callers log it and keep playing best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Audio session activation failed: {0}")]
pub struct SessionActivationError(pub String);

/// Playback errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// Track could not be loaded; playback stays on the current track
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Audio session activation failed
    #[error(transparent)]
    SessionActivation(#[from] SessionActivationError),

    /// No resolvable track (empty queue or end of queue with repeat off)
    #[error("Queue is empty")]
    EmptyQueue,

    /// No track is currently bound to the active buffer
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The player task has shut down
    #[error("Player task is no longer running")]
    PlayerClosed,
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
