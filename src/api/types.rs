//! API request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::{ExerciseSessionId, SessionId};
use crate::repository::MediaArtifactRecord;
use crate::session::{ExerciseAck, LiveSnapshot, TransitionOutcome, TransitionRequest};

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Live state as seen by pollers.
#[derive(Debug, Clone, Serialize)]
pub struct LiveStateResponse {
    pub session_id: SessionId,
    pub active_exercise_id: Option<ExerciseSessionId>,
    pub terminated: bool,
}

impl LiveStateResponse {
    pub fn new(session_id: SessionId, snapshot: LiveSnapshot) -> Self {
        Self {
            session_id,
            active_exercise_id: snapshot.active_exercise_id,
            terminated: snapshot.terminated,
        }
    }
}

/// Controller write. Every field is optional; `{}` is a heartbeat.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiveUpdateRequest {
    /// Absent: leave as is. `null`: clear. Integer: select.
    #[serde(default, deserialize_with = "double_option")]
    pub active_exercise_id: Option<Option<ExerciseSessionId>>,
    #[serde(default)]
    pub terminated: Option<bool>,
}

impl From<LiveUpdateRequest> for TransitionRequest {
    fn from(req: LiveUpdateRequest) -> Self {
        TransitionRequest {
            active_exercise_id: req.active_exercise_id,
            terminated: req.terminated,
        }
    }
}

/// Result of a controller write.
///
/// `ok` acknowledges the active-exercise field only: `false` means the
/// change was rate limited and `active_exercise_id` still holds the previous
/// value.
#[derive(Debug, Clone, Serialize)]
pub struct LiveUpdateResponse {
    pub ok: bool,
    pub session_id: SessionId,
    pub active_exercise_id: Option<ExerciseSessionId>,
    pub terminated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl LiveUpdateResponse {
    pub fn from_outcome(session_id: SessionId, outcome: &TransitionOutcome) -> Self {
        let retry_after_ms = match outcome.exercise {
            ExerciseAck::RateLimited { retry_after } => Some(retry_after.as_millis() as u64),
            _ => None,
        };
        Self {
            ok: outcome.ok(),
            session_id,
            active_exercise_id: outcome.snapshot.active_exercise_id,
            terminated: outcome.snapshot.terminated,
            retry_after_ms,
        }
    }
}

/// Result of a media upload. Exactly one of `message` / `error` is set.
#[derive(Debug, Clone, Serialize)]
pub struct MediaCommitResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MediaCommitResponse {
    pub fn committed() -> Self {
        Self {
            success: true,
            message: Some("video saved".to_string()),
            error: None,
        }
    }

    pub fn already_exists() -> Self {
        Self {
            success: true,
            message: Some("video already exists".to_string()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// A committed media record.
#[derive(Debug, Clone, Serialize)]
pub struct MediaArtifactResponse {
    pub exercise_session_id: ExerciseSessionId,
    pub locator: String,
    pub expires_at: DateTime<Utc>,
}

impl From<MediaArtifactRecord> for MediaArtifactResponse {
    fn from(record: MediaArtifactRecord) -> Self {
        Self {
            exercise_session_id: record.exercise_session_id,
            locator: record.locator,
            expires_at: record.expires_at,
        }
    }
}

/// Generic API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "SESSION_NOT_FOUND").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new("UNAUTHORIZED", "A valid bearer token is required")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new("PAYLOAD_TOO_LARGE", message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new("UPSTREAM_FAILURE", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}
