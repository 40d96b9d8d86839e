//! In-process repository backed by hash maps.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    ExerciseInSession, MediaArtifactRecord, Repository, RepositoryError, SessionRecord,
    SessionStatus,
};
use crate::ids::{ExerciseSessionId, SessionId};

/// Seed data for a [`MemoryRepository`], usually loaded from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub sessions: Vec<SessionRecord>,
    pub exercise_sessions: Vec<ExerciseInSession>,
    pub media: Vec<MediaArtifactRecord>,
}

impl Fixture {
    /// Load a fixture from a JSON file.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            crate::SyncError::Validation(format!("invalid fixture {}: {}", path.display(), e))
        })
    }
}

#[derive(Debug, Default)]
struct Tables {
    sessions: HashMap<SessionId, SessionRecord>,
    exercise_sessions: HashMap<ExerciseSessionId, ExerciseInSession>,
    media: HashMap<ExerciseSessionId, MediaArtifactRecord>,
}

/// Thread-safe in-memory repository.
///
/// Media records are keyed by exercise-in-session, which gives the same
/// uniqueness guarantee a primary key would in a relational store.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository seeded from a fixture.
    pub fn from_fixture(fixture: Fixture) -> Self {
        let tables = Tables {
            sessions: fixture.sessions.into_iter().map(|s| (s.id, s)).collect(),
            exercise_sessions: fixture
                .exercise_sessions
                .into_iter()
                .map(|e| (e.id, e))
                .collect(),
            media: fixture
                .media
                .into_iter()
                .map(|m| (m.exercise_session_id, m))
                .collect(),
        };
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Add a session (builder style, for seeding).
    pub fn with_session(self, session: SessionRecord) -> Self {
        if let Ok(mut tables) = self.tables.write() {
            tables.sessions.insert(session.id, session);
        }
        self
    }

    /// Add an exercise-in-session (builder style, for seeding).
    pub fn with_exercise_session(self, exercise: ExerciseInSession) -> Self {
        if let Ok(mut tables) = self.tables.write() {
            tables.exercise_sessions.insert(exercise.id, exercise);
        }
        self
    }

    /// Number of committed media records.
    pub fn media_count(&self) -> usize {
        self.tables.read().map(|t| t.media.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, RepositoryError> {
        self.tables
            .read()
            .map_err(|_| RepositoryError::Backend("repository lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, RepositoryError> {
        self.tables
            .write()
            .map_err(|_| RepositoryError::Backend("repository lock poisoned".into()))
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn session(&self, id: SessionId) -> Result<Option<SessionRecord>, RepositoryError> {
        Ok(self.read()?.sessions.get(&id).cloned())
    }

    async fn exercise_in_session(
        &self,
        id: ExerciseSessionId,
    ) -> Result<Option<ExerciseInSession>, RepositoryError> {
        Ok(self.read()?.exercise_sessions.get(&id).cloned())
    }

    async fn media_artifact(
        &self,
        id: ExerciseSessionId,
    ) -> Result<Option<MediaArtifactRecord>, RepositoryError> {
        Ok(self.read()?.media.get(&id).cloned())
    }

    async fn insert_media_artifact(&self, record: MediaArtifactRecord) -> Result<(), RepositoryError> {
        let mut tables = self.write()?;
        if tables.media.contains_key(&record.exercise_session_id) {
            return Err(RepositoryError::UniqueViolation(record.exercise_session_id));
        }
        if !tables
            .exercise_sessions
            .contains_key(&record.exercise_session_id)
        {
            return Err(RepositoryError::Backend(format!(
                "foreign key violation: {} does not exist",
                record.exercise_session_id
            )));
        }
        tables.media.insert(record.exercise_session_id, record);
        Ok(())
    }

    async fn complete_session(&self, id: SessionId) -> Result<(), RepositoryError> {
        let mut tables = self.write()?;
        let session = tables
            .sessions
            .get_mut(&id)
            .ok_or(RepositoryError::SessionNotFound(id))?;
        session.status = SessionStatus::Completed;
        Ok(())
    }
}
