//! # therapy-sync
//!
//! Live synchronization of therapy sessions between a controller (the
//! supervising professional) and a follower (the patient), plus an
//! idempotent commit protocol for the patient's response videos.
//!
//! ## Features
//!
//! - **Live state**: per-session `(active_exercise_id, terminated)` tuple,
//!   polled by both participants and written only by the controller
//! - **Anti-bounce**: changes to a different exercise closer together than
//!   a minimum interval are rejected with a negative acknowledgement
//! - **Idempotent media commits**: at most one durable record per
//!   exercise-in-session, even under retries and concurrent uploads
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use therapy_sync::{
//!     ExerciseSessionId, GovernorConfig, SessionId, SessionStateStore, SystemClock,
//!     TransitionGovernor, TransitionRequest,
//! };
//!
//! let governor = TransitionGovernor::new(
//!     Arc::new(SessionStateStore::new()),
//!     Arc::new(SystemClock),
//!     GovernorConfig::default(),
//! );
//!
//! let session = SessionId::from_raw(42);
//! let outcome = governor.apply(session, TransitionRequest::activate(ExerciseSessionId::from_raw(7)));
//! assert!(outcome.ok());
//!
//! // A different exercise right away is rate limited.
//! let outcome = governor.apply(session, TransitionRequest::activate(ExerciseSessionId::from_raw(9)));
//! assert!(!outcome.ok());
//! assert_eq!(governor.read(&session).active_exercise_id, Some(ExerciseSessionId::from_raw(7)));
//! ```

pub mod api;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod logging;
pub mod media;
pub mod repository;
pub mod security;
pub mod session;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, SyncError};
pub use ids::{ExerciseSessionId, SessionId, UserId};
pub use media::{CommitOutcome, MediaCommitter, MediaUpload, ObjectStore};
pub use repository::{MediaArtifactRecord, Repository, RepositoryError};
pub use session::{
    ExerciseAck, GovernorConfig, LiveSnapshot, SessionStateStore, TransitionGovernor,
    TransitionOutcome, TransitionRequest,
};
