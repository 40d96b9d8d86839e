//! Live session state.
//!
//! This module holds the ephemeral, per-session view both participants poll
//! and the policy deciding which writes to that view are accepted.

mod governor;
mod state;
mod store;

pub use governor::{
    ExerciseAck, GovernorConfig, TransitionGovernor, TransitionOutcome, TransitionRequest,
    DEFAULT_MIN_TRANSITION_INTERVAL,
};
pub use state::{LiveSessionState, LiveSnapshot};
pub use store::SessionStateStore;
