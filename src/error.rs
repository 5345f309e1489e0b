use thiserror::Error;

/// Quest core error types
///
/// None of these are fatal inside a running session: the session turns them
/// into user-visible messages, relaunches, or simply waits for better input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuestError {
    #[error("AR tracking is not supported on this device")]
    SensorUnavailable,

    #[error("Location access denied. Enable it in Settings to reach location goals")]
    LocationAuthorizationDenied,

    #[error("Location access is restricted on this device")]
    LocationAuthorizationRestricted,

    #[error("Location failure: {0}")]
    LocationFailure(String),

    #[error("Tracking session failed: {0}")]
    TrackingSessionFailure(String),

    #[error("Quest directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Quest not found: {0}")]
    QuestNotFound(String),

    #[error("Invalid quest catalog: {0}")]
    InvalidCatalog(String),

    #[error("Session task aborted: {0}")]
    SessionAborted(String),
}

/// Result type for quest core operations
pub type QuestResult<T> = Result<T, QuestError>;
