//! REST API handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        FromRequestParts, Path, State,
    },
    http::{request::Parts, StatusCode},
    Json,
};
use tracing::{info, warn};

use super::types::{
    ErrorResponse, LiveStateResponse, LiveUpdateRequest, LiveUpdateResponse,
    MediaArtifactResponse, MediaCommitResponse,
};
use crate::clock::{Clock, SystemClock};
use crate::error::SyncError;
use crate::ids::{ExerciseSessionId, SessionId, UserId};
use crate::media::{CommitOutcome, MediaCommitter, MediaConfig, MediaUpload, ObjectStore, Preflight};
use crate::repository::{Repository, SessionRecord};
use crate::security::TokenStore;
use crate::session::{GovernorConfig, SessionStateStore, TransitionGovernor, TransitionRequest};

/// Multipart field carrying the response video.
pub const VIDEO_FIELD: &str = "video";

/// Error half of handler results.
pub type ApiRejection = (StatusCode, Json<ErrorResponse>);

/// HTTP status for a domain error.
pub fn status_for(err: &SyncError) -> StatusCode {
    match err {
        SyncError::Unauthenticated => StatusCode::UNAUTHORIZED,
        SyncError::Forbidden(_) => StatusCode::FORBIDDEN,
        SyncError::Validation(_) => StatusCode::BAD_REQUEST,
        SyncError::SessionNotFound(_)
        | SyncError::ExerciseSessionNotFound(_)
        | SyncError::MediaNotFound(_) => StatusCode::NOT_FOUND,
        SyncError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        SyncError::Upstream(_) => StatusCode::BAD_GATEWAY,
        SyncError::Internal(_) | SyncError::Repository(_) | SyncError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Convert a domain error into a JSON error response.
pub fn reject(err: SyncError) -> ApiRejection {
    let status = status_for(&err);
    let body = match &err {
        SyncError::Unauthenticated => ErrorResponse::unauthorized(),
        SyncError::Forbidden(_) => ErrorResponse::forbidden(err.to_string()),
        SyncError::Validation(_) => ErrorResponse::bad_request(err.to_string()),
        SyncError::SessionNotFound(_)
        | SyncError::ExerciseSessionNotFound(_)
        | SyncError::MediaNotFound(_) => ErrorResponse::not_found(err.to_string()),
        SyncError::PayloadTooLarge(_) => ErrorResponse::payload_too_large(err.to_string()),
        SyncError::Upstream(_) => ErrorResponse::upstream(err.to_string()),
        SyncError::Internal(_) | SyncError::Repository(_) | SyncError::Io(_) => {
            ErrorResponse::internal_error(err.to_string())
        }
    };
    (status, Json(body))
}

/// Optional collaborators and tuning for [`AppState`].
#[derive(Clone)]
pub struct AppOptions {
    pub clock: Arc<dyn Clock>,
    pub governor: GovernorConfig,
    pub media: MediaConfig,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            governor: GovernorConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub live: Arc<TransitionGovernor>,
    pub media: Arc<MediaCommitter>,
    pub repository: Arc<dyn Repository>,
    pub tokens: Arc<TokenStore>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn Repository>,
        objects: Arc<dyn ObjectStore>,
        tokens: TokenStore,
    ) -> Self {
        Self::with_options(repository, objects, tokens, AppOptions::default())
    }

    pub fn with_options(
        repository: Arc<dyn Repository>,
        objects: Arc<dyn ObjectStore>,
        tokens: TokenStore,
        options: AppOptions,
    ) -> Self {
        let store = Arc::new(SessionStateStore::new());
        let live = Arc::new(TransitionGovernor::new(
            store,
            Arc::clone(&options.clock),
            options.governor,
        ));
        let media = Arc::new(MediaCommitter::new(
            Arc::clone(&repository),
            objects,
            Arc::clone(&options.clock),
            options.media,
        ));
        Self {
            live,
            media,
            repository,
            tokens: Arc::new(tokens),
            clock: options.clock,
        }
    }

    /// Live state store shared by all handlers.
    pub fn store(&self) -> &Arc<SessionStateStore> {
        self.live.store()
    }

    async fn session(&self, id: SessionId) -> Result<SessionRecord, SyncError> {
        self.repository
            .session(id)
            .await?
            .ok_or(SyncError::SessionNotFound(id))
    }

    /// Load a session and require the caller to be its controller.
    async fn controlled_session(&self, caller: UserId, id: SessionId) -> Result<SessionRecord, SyncError> {
        let session = self.session(id).await?;
        if !session.is_controller(caller) {
            warn!(caller = %caller, session = %id, "live state write by non-controller");
            return Err(SyncError::Forbidden(format!(
                "{caller} is not the controller of {id}"
            )));
        }
        Ok(session)
    }
}

/// The authenticated user behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub UserId);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state
            .tokens
            .authenticate(&parts.headers)
            .map(Caller)
            .ok_or_else(|| reject(SyncError::Unauthenticated))
    }
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint.
pub async fn api_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "therapy-sync",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Read the live state of a session (either participant).
pub async fn read_live(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(session_id): Path<u64>,
) -> Result<Json<LiveStateResponse>, ApiRejection> {
    let id = SessionId::from_raw(session_id);
    let session = state.session(id).await.map_err(reject)?;

    if !session.is_participant(caller) {
        return Err(reject(SyncError::Forbidden(format!(
            "{caller} is not a participant of {id}"
        ))));
    }

    Ok(Json(LiveStateResponse::new(id, state.live.read(&id))))
}

/// Update the live state of a session (controller only).
pub async fn update_live(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(session_id): Path<u64>,
    body: Bytes,
) -> Result<Json<LiveUpdateResponse>, ApiRejection> {
    let id = SessionId::from_raw(session_id);
    state
        .controlled_session(caller, id)
        .await
        .map_err(reject)?;

    // An empty body is a heartbeat, same as `{}`.
    let req: LiveUpdateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LiveUpdateRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| reject(SyncError::Validation(format!("invalid body: {e}"))))?
    };

    if let Some(Some(exercise_id)) = req.active_exercise_id {
        ensure_attached(&state, id, exercise_id)
            .await
            .map_err(reject)?;
    }

    let outcome = state.live.apply(id, req.into());
    Ok(Json(LiveUpdateResponse::from_outcome(id, &outcome)))
}

/// The selected exercise must belong to the session being driven.
async fn ensure_attached(
    state: &AppState,
    session_id: SessionId,
    exercise_id: ExerciseSessionId,
) -> Result<(), SyncError> {
    match state.repository.exercise_in_session(exercise_id).await? {
        Some(exercise) if exercise.session_id == session_id => Ok(()),
        _ => Err(SyncError::Validation(format!(
            "{exercise_id} is not attached to {session_id}"
        ))),
    }
}

/// Mark a session completed and terminate its live state (controller only).
pub async fn finish_session(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(session_id): Path<u64>,
) -> Result<Json<LiveUpdateResponse>, ApiRejection> {
    let id = SessionId::from_raw(session_id);
    state
        .controlled_session(caller, id)
        .await
        .map_err(reject)?;

    state
        .repository
        .complete_session(id)
        .await
        .map_err(|e| reject(e.into()))?;

    let outcome = state.live.apply(id, TransitionRequest::terminate(true));
    info!(session = %id, "session finished");
    Ok(Json(LiveUpdateResponse::from_outcome(id, &outcome)))
}

fn multipart_error(err: MultipartError) -> SyncError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        SyncError::PayloadTooLarge(err.body_text())
    } else {
        SyncError::Validation(err.body_text())
    }
}

/// Pull the video field out of a multipart body.
async fn read_video(mut multipart: Multipart) -> Result<Option<MediaUpload>, SyncError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(ToString::to_string);
        let content_type = field.content_type().map(ToString::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;

        return Ok(Some(MediaUpload {
            file_name,
            content_type,
            data,
        }));
    }
    Ok(None)
}

fn media_failure(err: SyncError) -> (StatusCode, Json<MediaCommitResponse>) {
    (status_for(&err), Json(MediaCommitResponse::failed(err.to_string())))
}

/// Commit the response video of an exercise-in-session (owning patient only).
///
/// The multipart body is only read once ownership is confirmed and no record
/// exists yet.
pub async fn commit_media(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(exercise_session_id): Path<u64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> (StatusCode, Json<MediaCommitResponse>) {
    let id = ExerciseSessionId::from_raw(exercise_session_id);

    let exercise = match state.media.preflight(caller, id).await {
        Ok(Preflight::Ready(exercise)) => exercise,
        Ok(Preflight::AlreadyExists) => {
            return (StatusCode::OK, Json(MediaCommitResponse::already_exists()))
        }
        Err(e) => return media_failure(e),
    };

    let upload = match multipart {
        Ok(multipart) => match read_video(multipart).await {
            Ok(upload) => upload,
            Err(e) => return media_failure(e),
        },
        Err(rejection) => {
            warn!(exercise_session = %id, error = %rejection.body_text(), "upload is not multipart");
            None
        }
    };

    match state.media.upload_and_commit(&exercise, upload).await {
        Ok(CommitOutcome::Committed(_)) => (StatusCode::OK, Json(MediaCommitResponse::committed())),
        Ok(CommitOutcome::AlreadyExists) => {
            (StatusCode::OK, Json(MediaCommitResponse::already_exists()))
        }
        Err(e) => media_failure(e),
    }
}

/// Read the committed media record of an exercise-in-session.
pub async fn get_media(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(exercise_session_id): Path<u64>,
) -> Result<Json<MediaArtifactResponse>, ApiRejection> {
    let id = ExerciseSessionId::from_raw(exercise_session_id);
    let record = state.media.artifact(caller, id).await.map_err(reject)?;
    Ok(Json(record.into()))
}
