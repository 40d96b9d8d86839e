//! API router configuration.

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use chrono::TimeDelta;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    api_info, commit_media, finish_session, get_media, health, read_live, update_live, AppState,
};

/// Default upload limit for response videos (64 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Create the API router with the given state.
pub fn create_router(state: AppState) -> Router {
    create_router_with_limit(state, DEFAULT_MAX_UPLOAD_BYTES)
}

/// Create the API router with a custom upload size limit.
pub fn create_router_with_limit(state: AppState, max_upload_bytes: usize) -> Router {
    // Live session routes
    let session_routes = Router::new()
        .route("/{id}/live", get(read_live).post(update_live))
        .route("/{id}/finish", post(finish_session));

    // Media routes
    let media_routes = Router::new().route(
        "/{id}/media",
        get(get_media)
            .post(commit_media)
            .layer(DefaultBodyLimit::max(max_upload_bytes)),
    );

    // API v1 routes
    let api_v1 = Router::new()
        .route("/", get(api_info))
        .nest("/sessions", session_routes)
        .nest("/exercise-sessions", media_routes);

    // Build main router
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Stop accepting connections on Ctrl-C and drain in-flight requests.
    pub graceful_shutdown: bool,
    /// Upper bound on an uploaded video body.
    pub max_upload_bytes: usize,
    /// Live entries without writes for this long are evicted.
    pub state_retention: Duration,
    /// How often the eviction sweep runs.
    pub sweep_interval: Duration,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn without_graceful_shutdown(mut self) -> Self {
        self.graceful_shutdown = false;
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_state_retention(mut self, retention: Duration, sweep_interval: Duration) -> Self {
        self.state_retention = retention;
        self.sweep_interval = sweep_interval;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            graceful_shutdown: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            state_retention: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(300),
        }
    }
}

/// Periodically evict idle live-state entries.
pub fn spawn_state_sweeper(state: &AppState, retention: Duration, every: Duration) -> JoinHandle<()> {
    let store = state.store().clone();
    let clock = state.clock.clone();
    let max_idle = TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.evict_idle(clock.now(), max_idle);
            if removed > 0 {
                tracing::info!(removed, remaining = store.len(), "evicted idle live session state");
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}

/// Start the API server.
pub async fn serve(config: ServerConfig, state: AppState) -> crate::Result<()> {
    let addr = config.bind_address();
    let sweeper = spawn_state_sweeper(&state, config.state_retention, config.sweep_interval);
    let router = create_router_with_limit(state, config.max_upload_bytes);

    tracing::info!("Starting therapy-sync API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(crate::error::SyncError::Io)?;

    let result = if config.graceful_shutdown {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    } else {
        axum::serve(listener, router).await
    };

    sweeper.abort();
    result.map_err(|e| crate::error::SyncError::Io(std::io::Error::other(e.to_string())))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MemoryObjectStore;
    use crate::repository::MemoryRepository;
    use crate::security::TokenStore;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryObjectStore::new()),
            TokenStore::default(),
        )
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert!(config.graceful_shutdown);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_server_config_custom() {
        let config = ServerConfig::new("0.0.0.0", 8080)
            .without_graceful_shutdown()
            .with_max_upload_bytes(1024);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(!config.graceful_shutdown);
        assert_eq!(config.max_upload_bytes, 1024);
    }

    #[test]
    fn test_router_creation() {
        let _router = create_router(state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_idle_entries() {
        use crate::ids::SessionId;
        use crate::session::TransitionRequest;

        let state = state();
        state
            .live
            .apply(SessionId::from_raw(1), TransitionRequest::terminate(true));
        assert_eq!(state.store().len(), 1);

        // Zero retention: every entry is idle at the first sweep.
        let sweeper = spawn_state_sweeper(&state, Duration::ZERO, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(state.store().is_empty());
        sweeper.abort();
    }
}
