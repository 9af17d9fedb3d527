//! Daemon orchestration -- config resolution, watcher lifecycle, signal handling.
//!
//! The [`Orchestrator`] is the central coordinator of `lastwords-daemon`.
//! It builds the container watcher from configuration, starts it, and
//! supervises it until a shutdown signal arrives. A periodic health probe
//! logs status transitions and terminates the daemon with an error when
//! the watcher reports itself unhealthy (for example when the Docker
//! event stream has closed).
//!
//! # Configuration Resolution (highest wins)
//!
//! 1. CLI arguments
//! 2. Environment variables (`LASTWORDS_*`)
//! 3. `lastwords.toml`
//! 4. Built-in defaults

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::time::{Duration, MissedTickBehavior};

use lastwords_core::config::LastwordsConfig;
use lastwords_core::error::{ConfigError, LastwordsError};
use lastwords_core::pipeline::{HealthStatus, Pipeline};
use lastwords_watcher::{
    AnyNotifier, BollardDockerClient, ContainerWatcher, ContainerWatcherBuilder,
    ContainerWatcherConfig,
};

use crate::cli::{DaemonCli, DEFAULT_CONFIG_PATH};

/// Seconds between watcher health probes.
const HEALTH_CHECK_INTERVAL_SECS: u64 = 30;

/// Load and resolve the daemon configuration.
///
/// Reads the TOML file named by `--config`, then applies environment
/// variable overrides and finally CLI argument overrides. A missing file
/// at the *default* location is not an error -- built-in defaults are
/// used instead. A missing file at an explicitly given path is an error.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the
/// resolved configuration fails validation.
pub async fn load_config(cli: &DaemonCli) -> Result<LastwordsConfig> {
    let mut config = match LastwordsConfig::from_file(&cli.config).await {
        Ok(config) => config,
        Err(LastwordsError::Config(ConfigError::FileNotFound { .. }))
            if cli.config == Path::new(DEFAULT_CONFIG_PATH) =>
        {
            LastwordsConfig::default()
        }
        Err(e) => return Err(anyhow::anyhow!("failed to load config: {}", e)),
    };

    config.apply_env_overrides();
    apply_cli_overrides(&mut config, cli);

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    Ok(config)
}

/// Apply CLI argument overrides onto an already-loaded configuration.
fn apply_cli_overrides(config: &mut LastwordsConfig, cli: &DaemonCli) {
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    if let Some(pid_file) = &cli.pid_file {
        config.general.pid_file = pid_file.clone();
    }
    if let Some(socket) = &cli.docker_socket {
        config.watcher.docker_socket = socket.clone();
    }
    if let Some(tail) = cli.tail {
        config.watcher.log_tail = tail;
    }
}

/// The main daemon orchestrator.
///
/// Owns the container watcher and manages its complete lifecycle:
/// startup, health supervision, and graceful shutdown.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LastwordsConfig,
    /// The container watcher pipeline.
    watcher: ContainerWatcher<BollardDockerClient, AnyNotifier>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Build the orchestrator from an already-loaded configuration.
    ///
    /// Creates the Docker client and notifier, then assembles the
    /// container watcher. The Docker client is constructed lazily; no
    /// connection is attempted until the watcher starts.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or any
    /// component fails to build.
    pub fn build_from_config(config: LastwordsConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        tracing::info!(
            socket = %config.watcher.docker_socket,
            "creating docker client"
        );
        let docker = Arc::new(
            BollardDockerClient::connect_with_socket(&config.watcher.docker_socket)
                .map_err(|e| anyhow::anyhow!("failed to create docker client: {}", e))?,
        );

        let notifier = Arc::new(
            AnyNotifier::from_config(&config.notify)
                .map_err(|e| anyhow::anyhow!("failed to build notifier: {}", e))?,
        );
        tracing::info!(transport = %config.notify.transport, "notifier initialized");

        let watcher_config = ContainerWatcherConfig::from_core(&config.watcher);
        let watcher = ContainerWatcherBuilder::new()
            .config(watcher_config)
            .docker_client(docker)
            .notifier(notifier)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build container watcher: {}", e))?;

        tracing::info!("orchestrator initialized");

        Ok(Self {
            config,
            watcher,
            start_time: Instant::now(),
        })
    }

    /// Start the watcher and supervise it until shutdown.
    ///
    /// This method blocks until a shutdown signal is received or the
    /// watcher becomes unhealthy.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    /// - Watcher health probe reporting `Unhealthy`
    pub async fn run(&mut self) -> Result<()> {
        if !self.config.general.pid_file.is_empty() {
            write_pid_file(Path::new(&self.config.general.pid_file))?;
        }

        if let Err(e) = self.watcher.start().await {
            tracing::error!(error = %e, "container watcher failed to start");
            self.cleanup_pid_file();
            return Err(e.into());
        }

        tracing::info!("entering main supervision loop");
        let outcome = self.supervise().await;

        if self.watcher.state_name() == "running" {
            if let Err(e) = self.watcher.stop().await {
                tracing::error!(error = %e, "failed to stop container watcher");
            }
        }

        tracing::info!(
            events_processed = self.watcher.events_processed(),
            crashes_detected = self.watcher.crashes_detected(),
            notification_failures = self.watcher.notification_failures(),
            uptime_secs = self.start_time.elapsed().as_secs(),
            "watcher summary"
        );

        self.cleanup_pid_file();
        outcome
    }

    /// Wait for a shutdown signal while periodically probing watcher health.
    async fn supervise(&mut self) -> Result<()> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

        let mut health_interval =
            tokio::time::interval(Duration::from_secs(HEALTH_CHECK_INTERVAL_SECS));
        health_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // 첫 tick은 즉시 발화하므로 소비하고 시작
        health_interval.tick().await;

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!(signal = "SIGTERM", "shutdown signal received");
                    return Ok(());
                }
                _ = sigint.recv() => {
                    tracing::info!(signal = "SIGINT", "shutdown signal received");
                    return Ok(());
                }
                _ = health_interval.tick() => {
                    match self.watcher.health_check().await {
                        HealthStatus::Healthy => {
                            tracing::debug!("watcher healthy");
                        }
                        HealthStatus::Degraded(reason) => {
                            tracing::warn!(reason = %reason, "watcher degraded");
                        }
                        HealthStatus::Unhealthy(reason) => {
                            tracing::error!(reason = %reason, "watcher unhealthy, shutting down");
                            anyhow::bail!("watcher became unhealthy: {reason}");
                        }
                    }
                }
            }
        }
    }

    /// Remove the PID file if one was configured.
    fn cleanup_pid_file(&self) {
        if !self.config.general.pid_file.is_empty() {
            remove_pid_file(Path::new(&self.config.general.pid_file));
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LastwordsConfig {
        &self.config
    }
}

/// Write the current process PID to a file.
///
/// Used to prevent duplicate daemon instances.
///
/// # Security
///
/// - Uses `create_new(true)` to atomically create the file (no TOCTOU window)
/// - Verifies the created file is a regular file (rejects symlinks)
/// - Creates the parent directory with restrictive permissions (0o700)
///
/// # Errors
///
/// Returns an error if the PID file already exists or cannot be written.
fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            let mut builder = fs::DirBuilder::new();
            builder.mode(0o700).recursive(true);
            builder.create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_string());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let metadata = file.metadata()?;
    if !metadata.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file (possible symlink attack)",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        file.set_permissions(permissions)?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to remove PID file"
        );
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}
