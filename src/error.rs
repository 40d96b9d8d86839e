//! Error types for therapy-sync.

use thiserror::Error;

use crate::ids::{ExerciseSessionId, SessionId};
use crate::media::ObjectStoreError;
use crate::repository::RepositoryError;

/// Main error type for therapy-sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No valid credentials were presented.
    #[error("authentication required")]
    Unauthenticated,

    /// The caller is authenticated but not allowed to perform the action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The request is malformed or references something it may not.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Session with the given ID is unknown to the repository.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Exercise-in-session with the given ID is unknown to the repository.
    #[error("exercise session not found: {0}")]
    ExerciseSessionNotFound(ExerciseSessionId),

    /// No media artifact has been committed for the exercise-in-session.
    #[error("no media committed for {0}")]
    MediaNotFound(ExerciseSessionId),

    /// The request body exceeds the configured upload limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// The object store failed or returned an unusable answer.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// A value computed by the service itself is out of range.
    #[error("internal error: {0}")]
    Internal(String),

    /// Repository failure.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ObjectStoreError> for SyncError {
    fn from(e: ObjectStoreError) -> Self {
        Self::Upstream(e.to_string())
    }
}

/// Convenience Result type for therapy-sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
