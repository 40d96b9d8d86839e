//! API layer for therapy-sync.
//!
//! All `/api/v1` routes except the info route require an
//! `Authorization: Bearer <token>` header.
//!
//! ## Endpoints
//!
//! ### Health & Info
//! - `GET /health` - Health check
//! - `GET /api/v1/` - API information
//!
//! ### Live session state
//! - `GET /api/v1/sessions/{id}/live` - Current active exercise and termination flag
//! - `POST /api/v1/sessions/{id}/live` - Controller update (`{active_exercise_id?, terminated?}`)
//! - `POST /api/v1/sessions/{id}/finish` - Mark the session completed
//!
//! ### Response videos
//! - `POST /api/v1/exercise-sessions/{id}/media` - Multipart upload (field `video`)
//! - `GET /api/v1/exercise-sessions/{id}/media` - Committed record
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use therapy_sync::api::{serve, AppState, ServerConfig};
//! use therapy_sync::media::MemoryObjectStore;
//! use therapy_sync::repository::MemoryRepository;
//! use therapy_sync::security::TokenStore;
//!
//! #[tokio::main]
//! async fn main() -> therapy_sync::Result<()> {
//!     let state = AppState::new(
//!         Arc::new(MemoryRepository::new()),
//!         Arc::new(MemoryObjectStore::new()),
//!         TokenStore::default(),
//!     );
//!     serve(ServerConfig::new("127.0.0.1", 3000), state).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;

// Re-export commonly used types
pub use handlers::{AppOptions, AppState, Caller, VIDEO_FIELD};
pub use router::{
    create_router, create_router_with_limit, serve, spawn_state_sweeper, ServerConfig,
    DEFAULT_MAX_UPLOAD_BYTES,
};
pub use types::{
    ErrorResponse, LiveStateResponse, LiveUpdateRequest, LiveUpdateResponse,
    MediaArtifactResponse, MediaCommitResponse,
};
