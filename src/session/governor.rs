//! Transition policy for live session state.
//!
//! Changing the active exercise to a *different* exercise is rate limited so
//! retransmissions from the controller cannot make the follower flicker.
//! Clearing the active exercise and toggling termination are deliberate stop
//! actions and are never delayed.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use super::{LiveSessionState, LiveSnapshot, SessionStateStore};
use crate::clock::Clock;
use crate::ids::{ExerciseSessionId, SessionId};

/// Default minimum interval between two accepted exercise changes.
pub const DEFAULT_MIN_TRANSITION_INTERVAL: Duration = Duration::from_secs(6);

/// Governor configuration.
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Minimum time between two accepted changes to a different exercise.
    pub min_transition_interval: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            min_transition_interval: DEFAULT_MIN_TRANSITION_INTERVAL,
        }
    }
}

/// A requested change to the live state.
///
/// `active_exercise_id` is tri-state: `None` leaves the field alone,
/// `Some(None)` clears it, `Some(Some(id))` selects an exercise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionRequest {
    pub active_exercise_id: Option<Option<ExerciseSessionId>>,
    pub terminated: Option<bool>,
}

impl TransitionRequest {
    /// Select an exercise.
    pub fn activate(id: ExerciseSessionId) -> Self {
        Self {
            active_exercise_id: Some(Some(id)),
            terminated: None,
        }
    }

    /// Clear the active exercise.
    pub fn clear() -> Self {
        Self {
            active_exercise_id: Some(None),
            terminated: None,
        }
    }

    /// Set or reset termination.
    pub fn terminate(terminated: bool) -> Self {
        Self {
            active_exercise_id: None,
            terminated: Some(terminated),
        }
    }

    /// A request with no fields, used as a heartbeat.
    pub fn is_empty(&self) -> bool {
        self.active_exercise_id.is_none() && self.terminated.is_none()
    }
}

/// Acknowledgement for the active-exercise field of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExerciseAck {
    /// The request did not touch the field.
    NotRequested,
    /// The requested value was already current.
    Unchanged,
    /// The new value was stored.
    Applied,
    /// The change came too soon after the previous one and was dropped.
    RateLimited { retry_after: Duration },
}

impl ExerciseAck {
    pub fn is_ok(&self) -> bool {
        !matches!(self, ExerciseAck::RateLimited { .. })
    }
}

/// Result of running a request through the governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub exercise: ExerciseAck,
    /// State after the request (unchanged fields included).
    pub snapshot: LiveSnapshot,
}

impl TransitionOutcome {
    pub fn ok(&self) -> bool {
        self.exercise.is_ok()
    }
}

/// Applies transition requests to the state store.
pub struct TransitionGovernor {
    store: Arc<SessionStateStore>,
    clock: Arc<dyn Clock>,
    min_interval: Duration,
}

impl TransitionGovernor {
    pub fn new(store: Arc<SessionStateStore>, clock: Arc<dyn Clock>, config: GovernorConfig) -> Self {
        Self {
            store,
            clock,
            min_interval: config.min_transition_interval,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<SessionStateStore> {
        &self.store
    }

    /// Current tuple for a session.
    pub fn read(&self, id: &SessionId) -> LiveSnapshot {
        self.store.get(id)
    }

    /// Evaluate and apply a request.
    ///
    /// The whole decision runs inside the session's critical section, so two
    /// concurrent writers never both pass the elapsed-time check.
    pub fn apply(&self, id: SessionId, request: TransitionRequest) -> TransitionOutcome {
        let now = self.clock.now();
        let at = self.clock.instant();

        if request.is_empty() {
            self.store.touch(&id, now);
            return TransitionOutcome {
                exercise: ExerciseAck::NotRequested,
                snapshot: self.store.get(&id),
            };
        }

        self.store.apply(id, now, |state| {
            let exercise = match request.active_exercise_id {
                Some(requested) => self.transition_exercise(id, state, requested, at),
                None => ExerciseAck::NotRequested,
            };

            if let Some(terminated) = request.terminated {
                if state.terminated != terminated {
                    info!(session = %id, terminated, "termination flag changed");
                }
                state.terminated = terminated;
            }

            state.touch(now);
            TransitionOutcome {
                exercise,
                snapshot: state.snapshot(),
            }
        })
    }

    fn transition_exercise(
        &self,
        id: SessionId,
        state: &mut LiveSessionState,
        requested: Option<ExerciseSessionId>,
        at: Instant,
    ) -> ExerciseAck {
        if state.active_exercise_id == requested {
            return ExerciseAck::Unchanged;
        }

        if requested.is_some() && state.active_exercise_id.is_some() {
            if let Some(last) = state.last_transition_at {
                let elapsed = at.saturating_duration_since(last);
                if elapsed < self.min_interval {
                    let retry_after = self.min_interval - elapsed;
                    debug!(
                        session = %id,
                        current = ?state.active_exercise_id,
                        ?requested,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "exercise change rate limited"
                    );
                    return ExerciseAck::RateLimited { retry_after };
                }
            }
        }

        debug!(session = %id, from = ?state.active_exercise_id, to = ?requested, "active exercise changed");
        state.active_exercise_id = requested;
        state.last_transition_at = Some(at);
        ExerciseAck::Applied
    }
}
