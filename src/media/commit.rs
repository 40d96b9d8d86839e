//! Idempotent commit of response videos.
//!
//! A commit runs in two phases. The preflight checks ownership and skips work
//! when a record already exists; it is an optimization only. The commit phase
//! uploads under a key derived from the exercise-in-session, then inserts the
//! record and absorbs a uniqueness violation from the repository as success.
//! Correctness under concurrency rests on that constraint alone.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::TimeDelta;
use tracing::{error, info, warn};

use super::ObjectStore;
use crate::clock::Clock;
use crate::error::{Result, SyncError};
use crate::ids::{ExerciseSessionId, UserId};
use crate::repository::{
    ExerciseInSession, MediaArtifactRecord, Repository, RepositoryError, SessionRecord,
};

/// Default lifetime of a committed media record.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Media commit configuration.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// How long a committed record stays valid.
    pub retention: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
        }
    }
}

/// Object key for the response video of an exercise-in-session.
///
/// Deterministic so that retried uploads overwrite the same object.
pub fn object_key(id: ExerciseSessionId) -> String {
    format!("responses/exercise-session-{}", id.as_u64())
}

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl MediaUpload {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            file_name: None,
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Browsers send an empty filename for an unset file input.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.file_name.as_deref() == Some("")
    }
}

/// Result of the preflight phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preflight {
    /// The caller may upload for this exercise-in-session.
    Ready(ExerciseInSession),
    /// A record exists; nothing to do.
    AlreadyExists,
}

/// Result of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// This call created the record.
    Committed(MediaArtifactRecord),
    /// A record existed already, or a concurrent call created it first.
    AlreadyExists,
}

/// Runs the media commit protocol.
pub struct MediaCommitter {
    repository: Arc<dyn Repository>,
    objects: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    retention: TimeDelta,
}

impl MediaCommitter {
    pub fn new(
        repository: Arc<dyn Repository>,
        objects: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        config: MediaConfig,
    ) -> Self {
        Self {
            repository,
            objects,
            clock,
            retention: TimeDelta::from_std(config.retention).unwrap_or(TimeDelta::days(30)),
        }
    }

    /// Exercise-in-session and its owning session.
    async fn lookup(&self, id: ExerciseSessionId) -> Result<(ExerciseInSession, SessionRecord)> {
        let exercise = self
            .repository
            .exercise_in_session(id)
            .await?
            .ok_or(SyncError::ExerciseSessionNotFound(id))?;
        let session = self
            .repository
            .session(exercise.session_id)
            .await?
            .ok_or(SyncError::SessionNotFound(exercise.session_id))?;
        Ok((exercise, session))
    }

    /// Ownership and existence checks, in that order.
    pub async fn preflight(&self, caller: UserId, id: ExerciseSessionId) -> Result<Preflight> {
        let (exercise, session) = self.lookup(id).await?;

        if session.patient_id != caller {
            warn!(caller = %caller, exercise_session = %id, "media upload by non-owner");
            return Err(SyncError::Forbidden(format!(
                "{caller} does not own the session of {id}"
            )));
        }

        if self.repository.media_artifact(id).await?.is_some() {
            return Ok(Preflight::AlreadyExists);
        }

        Ok(Preflight::Ready(exercise))
    }

    /// Upload the payload and insert the record.
    ///
    /// `upload` is `None` when the request carried no file at all.
    pub async fn upload_and_commit(
        &self,
        exercise: &ExerciseInSession,
        upload: Option<MediaUpload>,
    ) -> Result<CommitOutcome> {
        let upload = upload
            .filter(|u| !u.is_empty())
            .ok_or_else(|| SyncError::Validation("a non-empty video file is required".into()))?;

        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.retention)
            .ok_or_else(|| SyncError::Internal("media retention exceeds the supported date range".into()))?;

        let key = object_key(exercise.id);
        let size = upload.data.len();
        let locator = self
            .objects
            .put(&key, upload.data, upload.content_type.as_deref())
            .await
            .map_err(|e| {
                warn!(exercise_session = %exercise.id, error = %e, "object store upload failed");
                SyncError::from(e)
            })?;

        if locator.trim().is_empty() {
            error!(exercise_session = %exercise.id, key = %key, "object store returned no locator");
            return Err(SyncError::Upstream(
                "object store returned no locator".into(),
            ));
        }

        let record = MediaArtifactRecord {
            exercise_session_id: exercise.id,
            locator,
            expires_at,
        };

        match self.repository.insert_media_artifact(record.clone()).await {
            Ok(()) => {
                info!(
                    exercise_session = %exercise.id,
                    bytes = size,
                    locator = %record.locator,
                    "media committed"
                );
                Ok(CommitOutcome::Committed(record))
            }
            Err(RepositoryError::UniqueViolation(_)) => {
                info!(exercise_session = %exercise.id, "concurrent commit won, reporting existing record");
                Ok(CommitOutcome::AlreadyExists)
            }
            Err(e) => {
                error!(exercise_session = %exercise.id, error = %e, "media commit failed");
                Err(e.into())
            }
        }
    }

    /// Run both phases.
    pub async fn commit(
        &self,
        caller: UserId,
        id: ExerciseSessionId,
        upload: Option<MediaUpload>,
    ) -> Result<CommitOutcome> {
        match self.preflight(caller, id).await? {
            Preflight::AlreadyExists => Ok(CommitOutcome::AlreadyExists),
            Preflight::Ready(exercise) => self.upload_and_commit(&exercise, upload).await,
        }
    }

    /// The committed record, visible to the owning patient and the
    /// session's professional.
    pub async fn artifact(&self, caller: UserId, id: ExerciseSessionId) -> Result<MediaArtifactRecord> {
        let (_, session) = self.lookup(id).await?;
        if !session.is_participant(caller) {
            return Err(SyncError::Forbidden(format!(
                "{caller} is not a participant of {}",
                session.id
            )));
        }

        self.repository
            .media_artifact(id)
            .await?
            .ok_or(SyncError::MediaNotFound(id))
    }
}
