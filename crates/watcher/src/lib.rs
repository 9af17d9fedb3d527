#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`WatcherError`)
//! - [`config`]: Watcher configuration (`ContainerWatcherConfig`, builder)
//! - [`policy`]: Restart policy classification (`is_trackable`)
//! - [`registry`]: Tracked container state (`Registry`, `ContainerRecord`)
//! - [`logs`]: Multiplexed log stream decoding (`MultiplexedLogCodec`, `collect_tail`)
//! - [`docker`]: Docker API abstraction (`DockerClient` trait, `BollardDockerClient`)
//! - [`notify`]: Notification delivery (`Notifier` trait, `ConsoleNotifier`, `WebhookNotifier`)
//! - [`reconciler`]: Event interpretation (`Reconciler`)
//! - [`watcher`]: Main orchestrator (`ContainerWatcher`, `ContainerWatcherBuilder`)
//!
//! # Architecture
//!
//! ```text
//! Docker events --mpsc--> Reconciler
//!                             |
//!                        Registry (die -> start = crash)
//!                             |
//!                        fetch_log_tail() + MultiplexedLogCodec
//!                             |
//!                        Notifier.notify()
//! ```

pub mod config;
pub mod docker;
pub mod error;
pub mod logs;
pub mod notify;
pub mod policy;
pub mod reconciler;
pub mod registry;
pub mod watcher;

// --- Public API Re-exports ---

// Watcher (main orchestrator)
pub use watcher::{ContainerWatcher, ContainerWatcherBuilder};

// Configuration
pub use config::{ContainerWatcherConfig, ContainerWatcherConfigBuilder};

// Error
pub use error::WatcherError;

// Docker API
pub use docker::{BollardDockerClient, ContainerEvent, DockerClient};

// Log decoding
pub use logs::{LogFrame, LogStreamKind, MultiplexedLogCodec, collect_tail};

// Notification
pub use notify::{AnyNotifier, ConsoleNotifier, Notifier, WebhookFormat, WebhookNotifier};

// Restart policy
pub use policy::is_trackable;

// Reconciler
pub use reconciler::Reconciler;

// Registry
pub use registry::{ContainerRecord, Registry};
