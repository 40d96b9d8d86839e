//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing, configuration loading and
//! repository fixture loading.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;
use therapy_sync::cli::{parse_args_from, Args};
use therapy_sync::config::Config;
use therapy_sync::repository::{Fixture, MemoryRepository, Repository, SessionStatus};
use therapy_sync::{ExerciseSessionId, SessionId, SyncError, UserId};

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("therapy-sync")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.host.is_none());
    assert!(result.port.is_none());
    assert!(result.config.is_none());
    assert!(result.fixture.is_none());
    assert!(result.storage_dir.is_none());
    assert!(!result.help);
    assert!(!result.version);
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-H",
        "0.0.0.0",
        "-p",
        "8080",
        "-f",
        "sessions.json",
        "-s",
        "/srv/videos",
        "-l",
        "debug",
    ]))
    .unwrap();

    assert_eq!(result.host.unwrap().to_string(), "0.0.0.0");
    assert_eq!(result.port, Some(8080));
    assert_eq!(result.fixture, Some(PathBuf::from("sessions.json")));
    assert_eq!(result.storage_dir, Some(PathBuf::from("/srv/videos")));
    assert_eq!(result.log_level, Some("debug".to_string()));
}

#[test]
fn test_cli_invalid_port() {
    let err = parse_args_from(args(&["-p", "70000"])).unwrap_err();
    assert!(err.to_string().contains("port"));
}

#[test]
fn test_cli_unknown_flag() {
    assert!(parse_args_from(args(&["--no-such-flag"])).is_err());
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_config_defaults_without_file() {
    let config = Config::load(&Args::default()).unwrap();

    assert_eq!(config.sync.min_transition_interval_ms, 6_000);
    assert_eq!(
        config.governor_config().min_transition_interval,
        Duration::from_secs(6)
    );
    assert_eq!(config.media.retention_days, 30);
}

#[test]
fn test_config_file_then_args() {
    let file = write_temp(
        r#"{
            "server": {"host": "0.0.0.0", "port": 8080, "graceful_shutdown": false},
            "sync": {"min_transition_interval_ms": 3000, "state_retention_secs": 600},
            "media": {"retention_days": 7, "storage_dir": "/tmp/videos"},
            "logging": {"level": "warn"}
        }"#,
    );

    let cli = parse_args_from(args(&[
        "-c",
        file.path().to_str().unwrap(),
        "-p",
        "9090",
    ]))
    .unwrap();
    let config = Config::load(&cli).unwrap();

    // File values survive where the command line is silent.
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.media.storage_dir, PathBuf::from("/tmp/videos"));
    // The command line wins where it speaks.
    assert_eq!(config.server.port, 9090);

    let server = config.to_server_config().unwrap();
    assert_eq!(server.port, 9090);
    assert!(!server.graceful_shutdown);
    assert_eq!(server.state_retention, Duration::from_secs(600));

    assert_eq!(
        config.governor_config().min_transition_interval,
        Duration::from_secs(3)
    );
    assert_eq!(
        config.media_config().unwrap().retention,
        Duration::from_secs(7 * 24 * 60 * 60)
    );
}

#[test]
fn test_config_missing_file() {
    let cli = Args {
        config: Some(PathBuf::from("/nonexistent/therapy-sync.json")),
        ..Args::default()
    };
    let err = Config::load(&cli).unwrap_err();
    assert!(err.to_string().contains("read config"));
}

#[test]
fn test_config_malformed_file() {
    let file = write_temp("{ not json");
    let err = Config::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("parse config"));
}

#[test]
fn test_config_tokens() {
    let file = write_temp(r#"{"auth": {"tokens": {"abc": 20, "def": 10}}}"#);
    let config = Config::from_file(file.path()).unwrap();
    let tokens = config.token_store();

    assert_eq!(tokens.resolve("abc"), Some(UserId::from_raw(20)));
    assert_eq!(tokens.resolve("def"), Some(UserId::from_raw(10)));
    assert_eq!(tokens.resolve("ghi"), None);
}

// ============================================================================
// Fixture Tests
// ============================================================================

#[tokio::test]
async fn test_fixture_loads_into_repository() {
    let file = write_temp(
        r#"{
            "sessions": [
                {"id": 42, "patient_id": 10, "professional_id": 20},
                {"id": 43, "patient_id": 11, "professional_id": 20, "status": "COMPLETED"}
            ],
            "exercise_sessions": [
                {"id": 7, "session_id": 42, "exercise_id": 70}
            ]
        }"#,
    );

    let fixture = Fixture::from_file(file.path()).unwrap();
    assert_eq!(fixture.sessions.len(), 2);
    assert!(fixture.media.is_empty());

    let repo = MemoryRepository::from_fixture(fixture);
    let session = repo.session(SessionId::from_raw(42)).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Pending);
    assert!(session.is_controller(UserId::from_raw(20)));

    let done = repo.session(SessionId::from_raw(43)).await.unwrap().unwrap();
    assert_eq!(done.status, SessionStatus::Completed);

    let exercise = repo
        .exercise_in_session(ExerciseSessionId::from_raw(7))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exercise.session_id, SessionId::from_raw(42));
}

#[test]
fn test_fixture_invalid_json() {
    let file = write_temp(r#"{"sessions": [{"id": "forty-two"}]}"#);
    let err = Fixture::from_file(file.path()).unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
}
