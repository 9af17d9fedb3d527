//! Orchestrator integration tests.
//!
//! Tests config resolution (file -> env -> CLI precedence) and
//! orchestrator assembly from loaded configuration.

use std::path::{Path, PathBuf};

use lastwords_core::config::LastwordsConfig;
use lastwords_daemon::cli::{DEFAULT_CONFIG_PATH, DaemonCli};
use lastwords_daemon::orchestrator::{Orchestrator, load_config};
use serial_test::serial;
use tempfile::TempDir;

/// Helper to build CLI arguments pointing at a given config path.
fn cli_for(config: PathBuf) -> DaemonCli {
    DaemonCli {
        config,
        log_level: None,
        log_format: None,
        docker_socket: None,
        tail: None,
        pid_file: None,
        validate: false,
    }
}

/// Helper to write a TOML config into a temp directory.
fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("lastwords.toml");
    std::fs::write(&path, content).expect("should write config file");
    path
}

// load_config applies env overrides, so every test that goes through it
// shares the LASTWORDS_* namespace and must be serialized.
#[tokio::test]
#[serial]
async fn test_load_config_reads_file() {
    // Given: A config file with custom values
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_config(
        &dir,
        r#"
[watcher]
log_tail = 33
"#,
    );

    // When: Loading config
    let config = load_config(&cli_for(path)).await.expect("should load");

    // Then: File values should be applied
    assert_eq!(config.watcher.log_tail, 33);
}

#[tokio::test]
#[serial]
async fn test_load_config_missing_default_file_uses_defaults() {
    // Given: The default config path (normally absent on test machines)
    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        // A real installation is present; skip
        return;
    }

    // When: Loading config
    let config = load_config(&cli_for(PathBuf::from(DEFAULT_CONFIG_PATH)))
        .await
        .expect("missing default file should fall back to defaults");

    // Then: Built-in defaults should be used
    assert_eq!(config.watcher.log_tail, 100);
    assert_eq!(config.notify.transport, "console");
}

#[tokio::test]
#[serial]
async fn test_load_config_missing_explicit_file_is_error() {
    // Given: An explicitly given path that does not exist
    let cli = cli_for(PathBuf::from("/nonexistent/lastwords-test.toml"));

    // When: Loading config
    let result = load_config(&cli).await;

    // Then: Should fail
    assert!(
        result.is_err(),
        "missing explicit config file should be an error"
    );
}

#[tokio::test]
#[serial]
async fn test_load_config_cli_overrides_file() {
    // Given: A config file and CLI overrides
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_config(
        &dir,
        r#"
[general]
log_level = "info"

[watcher]
log_tail = 33
"#,
    );

    let cli = DaemonCli {
        log_level: Some("error".to_owned()),
        tail: Some(99),
        ..cli_for(path)
    };

    // When: Loading config
    let config = load_config(&cli).await.expect("should load");

    // Then: CLI values should win
    assert_eq!(config.general.log_level, "error");
    assert_eq!(config.watcher.log_tail, 99);
}

#[tokio::test]
#[serial]
async fn test_load_config_cli_overrides_env() {
    // Given: A config file, an env override, and a CLI override
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_config(
        &dir,
        r#"
[watcher]
log_tail = 33
"#,
    );

    // SAFETY: Test isolation, guarded by #[serial]
    unsafe {
        std::env::set_var("LASTWORDS_WATCHER_LOG_TAIL", "44");
    }

    let cli = DaemonCli {
        tail: Some(55),
        ..cli_for(path.clone())
    };

    // When: Loading config
    let config = load_config(&cli).await.expect("should load");

    // Then: CLI beats env beats file
    assert_eq!(config.watcher.log_tail, 55);

    // And without the CLI override the env value wins
    let config = load_config(&cli_for(path)).await.expect("should load");
    assert_eq!(config.watcher.log_tail, 44);

    // Cleanup
    // SAFETY: Test cleanup
    unsafe {
        std::env::remove_var("LASTWORDS_WATCHER_LOG_TAIL");
    }
}

#[tokio::test]
#[serial]
async fn test_load_config_rejects_invalid_file() {
    // Given: A config file with an out-of-range value
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_config(
        &dir,
        r#"
[watcher]
log_tail = 0
"#,
    );

    // When: Loading config
    let result = load_config(&cli_for(path)).await;

    // Then: Should fail validation even before CLI overrides apply
    assert!(result.is_err(), "invalid config file should be rejected");
}

#[tokio::test]
#[serial]
async fn test_load_config_rejects_invalid_cli_override() {
    // Given: A valid file but an out-of-range CLI override
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_config(&dir, "");

    let cli = DaemonCli {
        tail: Some(0),
        ..cli_for(path)
    };

    // When: Loading config
    let result = load_config(&cli).await;

    // Then: Final validation should catch the bad override
    assert!(result.is_err(), "zero tail override should be rejected");
}

#[tokio::test]
#[serial]
async fn test_load_config_roundtrip_through_file() {
    // Given: A default config serialized to TOML
    let dir = TempDir::new().expect("should create temp dir");
    let serialized =
        toml::to_string_pretty(&LastwordsConfig::default()).expect("should serialize");
    let path = write_config(&dir, &serialized);

    // When: Loading it back through the daemon path
    let config = load_config(&cli_for(path)).await.expect("should load");

    // Then: Values should round-trip
    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.watcher.docker_socket, "/var/run/docker.sock");
    assert_eq!(config.notify.transport, "console");
}

#[test]
fn test_build_from_config_succeeds_with_defaults() {
    // Given: A default configuration
    let config = LastwordsConfig::default();

    // When: Building the orchestrator (docker client construction is lazy,
    // no daemon connection is attempted here)
    let result = Orchestrator::build_from_config(config);

    // Then: Should succeed
    assert!(result.is_ok(), "default config should build orchestrator");
    let orchestrator = result.expect("should build");
    assert_eq!(orchestrator.config().watcher.log_tail, 100);
}

#[test]
fn test_build_from_config_rejects_invalid_config() {
    // Given: An invalid configuration
    let mut config = LastwordsConfig::default();
    config.watcher.log_tail = 0;

    // When: Building the orchestrator
    let result = Orchestrator::build_from_config(config);

    // Then: Should fail validation
    assert!(result.is_err(), "invalid config should be rejected");
}

#[test]
fn test_build_from_config_rejects_webhook_without_url() {
    // Given: Webhook transport without a URL
    let mut config = LastwordsConfig::default();
    config.notify.transport = "webhook".to_owned();

    // When: Building the orchestrator
    let result = Orchestrator::build_from_config(config);

    // Then: Should fail
    assert!(
        result.is_err(),
        "webhook transport without URL should fail to build"
    );
}
