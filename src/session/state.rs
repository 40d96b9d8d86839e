//! Live per-session state record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::ids::ExerciseSessionId;

/// The live view of one session, as held by the state store.
///
/// Created lazily on the first write and never persisted. `terminated` is not
/// a latch: it may be reset to `false` when a session is resumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSessionState {
    /// Exercise currently shown to the follower, if any.
    pub active_exercise_id: Option<ExerciseSessionId>,
    /// Whether the controller has marked the session finished.
    pub terminated: bool,
    /// Monotonic time of the last accepted change of `active_exercise_id`.
    pub last_transition_at: Option<Instant>,
    /// Time of the last write of any kind (drives eviction).
    pub updated_at: DateTime<Utc>,
}

impl LiveSessionState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            active_exercise_id: None,
            terminated: false,
            last_transition_at: None,
            updated_at: now,
        }
    }

    /// The part of the state participants are allowed to see.
    pub fn snapshot(&self) -> LiveSnapshot {
        LiveSnapshot {
            active_exercise_id: self.active_exercise_id,
            terminated: self.terminated,
        }
    }

    /// Record a write at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// The `(active_exercise_id, terminated)` tuple returned to pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LiveSnapshot {
    pub active_exercise_id: Option<ExerciseSessionId>,
    pub terminated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_defaults() {
        let now = Utc::now();
        let state = LiveSessionState::new(now);
        assert!(state.active_exercise_id.is_none());
        assert!(!state.terminated);
        assert!(state.last_transition_at.is_none());
        assert_eq!(state.updated_at, now);
    }

    #[test]
    fn test_snapshot_matches_default() {
        let state = LiveSessionState::new(Utc::now());
        assert_eq!(state.snapshot(), LiveSnapshot::default());
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = LiveSnapshot {
            active_exercise_id: Some(ExerciseSessionId::from_raw(7)),
            terminated: false,
        };
        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["active_exercise_id"], 7);
        assert_eq!(json["terminated"], false);

        let json = serde_json::to_value(LiveSnapshot::default()).unwrap();
        assert!(json["active_exercise_id"].is_null());
    }
}
