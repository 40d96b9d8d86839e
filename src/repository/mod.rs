//! Durable session/exercise repository.
//!
//! The repository is the source of truth for who owns a session and which
//! exercises are attached to it, and the target of media commits. Its
//! uniqueness constraint on media records is what makes the commit protocol
//! idempotent under concurrency.

mod memory;

pub use memory::{Fixture, MemoryRepository};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{ExerciseSessionId, SessionId, UserId};

/// Lifecycle status of a durable session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

/// A scheduled session linking one patient and one professional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub patient_id: UserId,
    pub professional_id: UserId,
    #[serde(default)]
    pub status: SessionStatus,
}

impl SessionRecord {
    /// The professional of record controls the live state.
    pub fn is_controller(&self, user: UserId) -> bool {
        self.professional_id == user
    }

    pub fn is_participant(&self, user: UserId) -> bool {
        self.patient_id == user || self.professional_id == user
    }
}

/// One exercise attached to one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseInSession {
    pub id: ExerciseSessionId,
    pub session_id: SessionId,
    pub exercise_id: u64,
}

/// The committed response video of one exercise-in-session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaArtifactRecord {
    pub exercise_session_id: ExerciseSessionId,
    pub locator: String,
    pub expires_at: DateTime<Utc>,
}

/// Repository failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// A media record for this identity already exists.
    #[error("media record already exists for {0}")]
    UniqueViolation(ExerciseSessionId),

    /// The row to update does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Anything else the storage backend reports.
    #[error("{0}")]
    Backend(String),
}

/// Access to durable sessions and media records.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn session(&self, id: SessionId) -> Result<Option<SessionRecord>, RepositoryError>;

    async fn exercise_in_session(
        &self,
        id: ExerciseSessionId,
    ) -> Result<Option<ExerciseInSession>, RepositoryError>;

    async fn media_artifact(
        &self,
        id: ExerciseSessionId,
    ) -> Result<Option<MediaArtifactRecord>, RepositoryError>;

    /// Insert a media record in a single atomic write.
    ///
    /// Must fail with [`RepositoryError::UniqueViolation`] if a record for the
    /// same exercise-in-session already exists, and must leave nothing behind
    /// on any other failure.
    async fn insert_media_artifact(&self, record: MediaArtifactRecord) -> Result<(), RepositoryError>;

    /// Mark a session as completed.
    async fn complete_session(&self, id: SessionId) -> Result<(), RepositoryError>;
}
