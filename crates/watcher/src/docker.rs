//! Docker API abstraction for testability.
//!
//! The [`DockerClient`] trait abstracts the bollard Docker API, allowing
//! production code to use [`BollardDockerClient`] while tests use `MockDockerClient`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ ContainerWatcher │
//! └────────┬─────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │DockerClient │ (trait)
//!   └─────────────┘
//!        │     │
//!        ▼     ▼
//!   ┌─────┐ ┌──────┐
//!   │Bollard│ │Mock│
//!   └───┬─┘ └─────┘
//!       │
//!       ▼
//!   Docker Daemon
//! ```
//!
//! # Container ID Validation
//!
//! All methods that accept container IDs perform validation to prevent injection attacks:
//! - Must be 1-64 characters
//! - Must contain only ASCII hex digits ([0-9a-fA-F])
//! - Empty IDs and IDs with special characters are rejected
//!
//! # Raw Log Fetching
//!
//! Most calls go through bollard, but [`DockerClient::fetch_log_tail`] speaks
//! HTTP/1.1 over the Unix socket directly. bollard's `logs()` consumes the
//! multiplexed stream framing itself; fetching the endpoint raw keeps the
//! payload untouched so [`MultiplexedLogCodec`](crate::logs::MultiplexedLogCodec)
//! is the single place where framing is interpreted and framing errors surface
//! as decode errors.
//!
//! Containers created with a TTY are not multiplexed and are outside the
//! supported shape; their log payload fails selector validation downstream.
//!
//! # Examples
//!
//! ```ignore
//! use std::sync::Arc;
//! use lastwords_watcher::BollardDockerClient;
//!
//! // Connect to a specific Docker socket
//! let client = BollardDockerClient::connect_with_socket("/var/run/docker.sock")?;
//! let client = Arc::new(client);
//!
//! // List running containers
//! let containers = client.list_running().await?;
//! # Ok::<(), lastwords_watcher::WatcherError>(())
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use http_body_util::{BodyExt, Empty};
use hyper::{Method, Request, StatusCode, header};
use hyper_util::rt::TokioIo;
use lastwords_core::types::{ContainerDetails, ContainerSummary, LifecycleAction};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::WatcherError;

/// 기본 Docker 소켓 경로
const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// 로그 fetch 응답 청크를 전달하는 채널 버퍼 크기
const LOG_CHUNK_BUFFER: usize = 16;

/// 서버측 이벤트 필터에 등록하는 생명주기 액션 목록
const SUBSCRIBED_ACTIONS: [&str; 8] = [
    "start", "die", "restart", "kill", "oom", "pause", "unpause", "destroy",
];

/// Validates a container ID to prevent injection attacks.
///
/// Docker container IDs are 64-character hex strings (or shorter prefix forms).
/// This function ensures the ID contains only hex characters and is within valid
/// length. IDs are interpolated into request paths, so anything else is rejected
/// before a request is built.
fn validate_container_id(id: &str) -> Result<(), WatcherError> {
    if id.is_empty() || id.len() > 64 {
        return Err(WatcherError::DockerApi(format!(
            "invalid container ID: length {} (must be 1-64)",
            id.len()
        )));
    }
    if !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WatcherError::DockerApi(
            "invalid container ID: contains non-hex characters".to_owned(),
        ));
    }
    Ok(())
}

/// A container lifecycle event as observed on the Docker event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEvent {
    /// Full container ID from the event actor.
    pub container_id: String,
    /// The lifecycle action that occurred.
    pub action: LifecycleAction,
}

/// Trait abstracting Docker API operations.
///
/// All Docker API calls go through this trait, enabling testability via mocking.
/// The trait is `Send + Sync + 'static`, allowing safe sharing across async contexts.
///
/// # Implementations
///
/// - [`BollardDockerClient`]: Production implementation using the `bollard` library
/// - `MockDockerClient`: Test implementation with scripted responses (available in tests only)
///
/// # Error Handling
///
/// - **404 errors**: Converted to `WatcherError::ContainerNotFound`
/// - **Connection errors**: Wrapped as `WatcherError::DockerConnection`
/// - **Log transport errors**: Wrapped as `WatcherError::LogTransport`
pub trait DockerClient: Send + Sync + 'static {
    /// Lists running containers.
    ///
    /// Returns only running containers (stopped/exited containers are filtered).
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::DockerApi` if the Docker API call fails.
    fn list_running(
        &self,
    ) -> impl Future<Output = Result<Vec<ContainerSummary>, WatcherError>> + Send;

    /// Inspects a specific container.
    ///
    /// The returned details include the restart policy name, the daemon's
    /// restart count, and the lowercase state string (e.g. `running`,
    /// `restarting`).
    ///
    /// # Errors
    ///
    /// - `WatcherError::ContainerNotFound`: Container does not exist (404)
    /// - `WatcherError::DockerApi`: Invalid ID or other API errors
    fn inspect_container(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<ContainerDetails, WatcherError>> + Send;

    /// Subscribes to container lifecycle events.
    ///
    /// Returns a bounded channel fed by a background pump. Only the actions in
    /// [`LifecycleAction`] are delivered; anything else on the daemon stream is
    /// dropped. When the underlying stream ends or fails, the channel closes.
    ///
    /// # Arguments
    ///
    /// - `buffer`: Channel capacity. The pump applies backpressure when full.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::EventStream` if the subscription cannot be created.
    fn subscribe_events(
        &self,
        buffer: usize,
    ) -> impl Future<Output = Result<mpsc::Receiver<ContainerEvent>, WatcherError>> + Send;

    /// Fetches the last `tail` log lines of a container as raw bytes.
    ///
    /// The returned channel yields the HTTP response body chunks untouched,
    /// still wearing the daemon's multiplexed stream framing. Feed them to
    /// [`collect_tail`](crate::logs::collect_tail) to obtain plain text.
    ///
    /// # Errors
    ///
    /// - `WatcherError::ContainerNotFound`: Container does not exist (404)
    /// - `WatcherError::LogTransport`: Request or connection failure
    /// - `WatcherError::DockerApi`: Invalid container ID
    fn fetch_log_tail(
        &self,
        id: &str,
        tail: u32,
    ) -> impl Future<Output = Result<mpsc::Receiver<Result<Bytes, WatcherError>>, WatcherError>> + Send;

    /// Checks Docker daemon connectivity.
    ///
    /// Used by `ContainerWatcher`'s `Pipeline::health_check()` implementation.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::DockerConnection` if the daemon is unreachable.
    fn ping(&self) -> impl Future<Output = Result<(), WatcherError>> + Send;
}

/// Production Docker client implementation using `bollard`.
///
/// Communicates with the Docker daemon via a Unix socket. Internally uses
/// `Arc<bollard::Docker>` for safe sharing across async tasks, and keeps the
/// socket path around for the raw log endpoint.
///
/// # Connection Management
///
/// - Connection timeout: 120 seconds
/// - API version: Default (auto-negotiated)
/// - Socket path: Configurable (default: `/var/run/docker.sock`)
pub struct BollardDockerClient {
    docker: Arc<bollard::Docker>,
    socket_path: String,
}

impl BollardDockerClient {
    /// Connects to Docker using the default local socket.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::DockerConnection` if the connection fails
    /// (e.g., socket not found, permission denied, daemon not running).
    pub fn connect_local() -> Result<Self, WatcherError> {
        Self::connect_with_socket(DEFAULT_DOCKER_SOCKET)
    }

    /// Connects to Docker using a specific socket path.
    ///
    /// # Arguments
    ///
    /// - `socket_path`: Path to the Docker socket (e.g., `/var/run/docker.sock`)
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::DockerConnection` if the connection fails.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, WatcherError> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    WatcherError::DockerConnection(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
            socket_path: socket_path.to_owned(),
        })
    }
}

/// Docker 이벤트 메시지를 watcher 이벤트로 변환합니다.
///
/// 필터를 통과했더라도 액션 이름이 [`LifecycleAction`]에 없으면 버립니다.
fn map_event(message: &bollard::models::EventMessage) -> Option<ContainerEvent> {
    let action_str = message.action.as_deref()?;
    let Some(action) = LifecycleAction::from_str_loose(action_str) else {
        debug!(action = action_str, "ignoring unrecognized container event action");
        return None;
    };
    let container_id = message.actor.as_ref()?.id.clone()?;
    Some(ContainerEvent {
        container_id,
        action,
    })
}

impl DockerClient for BollardDockerClient {
    async fn list_running(&self) -> Result<Vec<ContainerSummary>, WatcherError> {
        use bollard::container::ListContainersOptions;

        let options = ListContainersOptions::<String> {
            all: false, // Only running containers; exited ones cannot crash-loop from here
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| WatcherError::DockerApi(format!("list containers failed: {e}")))?;

        let mut result = Vec::with_capacity(containers.len());
        for container in containers {
            let id = container.id.unwrap_or_default();
            let names = container.names.unwrap_or_default();
            let name = names
                .first()
                .map(|n| n.trim_start_matches('/').to_owned())
                .unwrap_or_default();
            let image = container.image.unwrap_or_default();
            let state = container.state.unwrap_or_default();

            result.push(ContainerSummary {
                id,
                name,
                image,
                state,
            });
        }

        Ok(result)
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails, WatcherError> {
        validate_container_id(id)?;

        let details = self.docker.inspect_container(id, None).await.map_err(|e| {
            if e.to_string().contains("404") {
                WatcherError::ContainerNotFound(id.to_owned())
            } else {
                WatcherError::DockerApi(format!("inspect container failed: {e}"))
            }
        })?;

        let container_id = details.id.unwrap_or_default();
        let name = details
            .name
            .map(|n| n.trim_start_matches('/').to_owned())
            .unwrap_or_default();
        let image = details
            .config
            .as_ref()
            .and_then(|c| c.image.clone())
            .unwrap_or_default();
        let restart_policy = details
            .host_config
            .as_ref()
            .and_then(|h| h.restart_policy.as_ref())
            .and_then(|p| p.name.as_ref())
            .map(|n| n.to_string())
            .unwrap_or_default();
        let restart_count = details
            .restart_count
            .and_then(|c| u64::try_from(c).ok())
            .unwrap_or(0);
        let state = details
            .state
            .and_then(|s| s.status)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_owned());

        Ok(ContainerDetails {
            id: container_id,
            name,
            image,
            restart_policy,
            restart_count,
            state,
        })
    }

    async fn subscribe_events(
        &self,
        buffer: usize,
    ) -> Result<mpsc::Receiver<ContainerEvent>, WatcherError> {
        use bollard::system::EventsOptions;

        let mut filters = HashMap::new();
        filters.insert("type".to_owned(), vec!["container".to_owned()]);
        filters.insert(
            "event".to_owned(),
            SUBSCRIBED_ACTIONS.iter().map(|a| (*a).to_owned()).collect(),
        );

        let options = EventsOptions::<String> {
            filters,
            ..Default::default()
        };

        let docker = Arc::clone(&self.docker);
        let (tx, rx) = mpsc::channel(buffer);

        tokio::spawn(async move {
            let mut stream = docker.events(Some(options));
            while let Some(item) = stream.next().await {
                match item {
                    Ok(message) => {
                        let Some(event) = map_event(&message) else {
                            continue;
                        };
                        if tx.send(event).await.is_err() {
                            // 수신측이 사라짐
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "docker event stream failed");
                        break;
                    }
                }
            }
            // tx drop으로 채널이 닫히고 수신측이 스트림 종료를 감지한다
            debug!("docker event stream ended");
        });

        Ok(rx)
    }

    async fn fetch_log_tail(
        &self,
        id: &str,
        tail: u32,
    ) -> Result<mpsc::Receiver<Result<Bytes, WatcherError>>, WatcherError> {
        validate_container_id(id)?;

        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            WatcherError::DockerConnection(format!(
                "failed to connect to docker at {}: {e}",
                self.socket_path
            ))
        })?;
        let io = TokioIo::new(stream);

        let (mut sender, connection) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| WatcherError::LogTransport(format!("http handshake failed: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "log fetch connection closed with error");
            }
        });

        let uri =
            format!("/containers/{id}/logs?stdout=true&stderr=true&timestamps=true&tail={tail}");
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::HOST, "docker")
            .body(Empty::<Bytes>::new())
            .map_err(|e| WatcherError::LogTransport(format!("failed to build log request: {e}")))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| WatcherError::LogTransport(format!("log request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(WatcherError::ContainerNotFound(id.to_owned()));
        }
        if !status.is_success() {
            return Err(WatcherError::LogTransport(format!(
                "log request returned status {status}"
            )));
        }

        let mut body = response.into_body();
        let (tx, rx) = mpsc::channel(LOG_CHUNK_BUFFER);

        tokio::spawn(async move {
            loop {
                match body.frame().await {
                    Some(Ok(frame)) => {
                        // 트레일러 등 데이터가 아닌 프레임은 건너뛴다
                        if let Ok(data) = frame.into_data() {
                            if tx.send(Ok(data)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let _ = tx
                            .send(Err(WatcherError::LogTransport(format!(
                                "log stream error: {e}"
                            ))))
                            .await;
                        break;
                    }
                    None => break,
                }
            }
        });

        Ok(rx)
    }

    async fn ping(&self) -> Result<(), WatcherError> {
        self.docker
            .ping()
            .await
            .map_err(|e| WatcherError::DockerConnection(format!("ping failed: {e}")))?;
        Ok(())
    }
}

/// 테스트용 Mock Docker 클라이언트
///
/// 대본화된 응답을 반환하여 Docker 없이도 테스트할 수 있습니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockDockerClient {
    /// inspect 응답으로 쓸 컨테이너 상세 목록 (list_running도 여기서 파생)
    pub containers: Vec<ContainerDetails>,
    /// subscribe_events가 순서대로 흘려보낼 이벤트 대본
    pub event_script: Vec<ContainerEvent>,
    /// fetch_log_tail이 흘려보낼 원시 청크
    pub log_chunks: Vec<Bytes>,
    /// list_running 실패 여부
    pub fail_list: bool,
    /// inspect_container 실패 여부
    pub fail_inspect: bool,
    /// fetch_log_tail 실패 여부
    pub fail_logs: bool,
    /// ping 실패 여부
    pub fail_ping: bool,
    /// subscribe_events 실패 여부
    pub fail_subscribe: bool,
    /// 대본 소진 후에도 이벤트 채널을 열어둘지 여부
    pub hold_events_open: bool,
}

#[cfg(test)]
impl MockDockerClient {
    /// 빈 응답의 mock 클라이언트를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 테스트용 컨테이너 상세 정보를 설정합니다.
    pub fn with_containers(mut self, containers: Vec<ContainerDetails>) -> Self {
        self.containers = containers;
        self
    }

    /// 이벤트 대본을 설정합니다.
    pub fn with_event_script(mut self, events: Vec<ContainerEvent>) -> Self {
        self.event_script = events;
        self
    }

    /// 로그 청크를 설정합니다.
    pub fn with_log_chunks(mut self, chunks: Vec<Bytes>) -> Self {
        self.log_chunks = chunks;
        self
    }

    /// list_running이 실패하도록 설정합니다.
    pub fn with_failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    /// inspect_container가 실패하도록 설정합니다.
    pub fn with_failing_inspect(mut self) -> Self {
        self.fail_inspect = true;
        self
    }

    /// fetch_log_tail이 실패하도록 설정합니다.
    pub fn with_failing_logs(mut self) -> Self {
        self.fail_logs = true;
        self
    }

    /// ping이 실패하도록 설정합니다.
    pub fn with_failing_ping(mut self) -> Self {
        self.fail_ping = true;
        self
    }

    /// subscribe_events가 실패하도록 설정합니다.
    pub fn with_failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    /// 대본 소진 후에도 이벤트 채널을 열어둡니다.
    ///
    /// 스트림이 살아있는 상태를 가정하는 health check 테스트에 씁니다.
    pub fn with_held_open_events(mut self) -> Self {
        self.hold_events_open = true;
        self
    }
}

#[cfg(test)]
impl DockerClient for MockDockerClient {
    async fn list_running(&self) -> Result<Vec<ContainerSummary>, WatcherError> {
        if self.fail_list {
            return Err(WatcherError::DockerApi("mock list failure".to_owned()));
        }
        Ok(self
            .containers
            .iter()
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                image: c.image.clone(),
                state: c.state.clone(),
            })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails, WatcherError> {
        if self.fail_inspect {
            return Err(WatcherError::DockerApi("mock inspect failure".to_owned()));
        }
        self.containers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| WatcherError::ContainerNotFound(id.to_owned()))
    }

    async fn subscribe_events(
        &self,
        buffer: usize,
    ) -> Result<mpsc::Receiver<ContainerEvent>, WatcherError> {
        if self.fail_subscribe {
            return Err(WatcherError::EventStream(
                "mock subscribe failure".to_owned(),
            ));
        }
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let events = self.event_script.clone();
        let hold_open = self.hold_events_open;
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            if hold_open {
                // tx를 쥔 채로 영원히 대기해 채널을 열어둔다
                std::future::pending::<()>().await;
            }
            // tx drop으로 대본 종료 = 스트림 종료
        });
        Ok(rx)
    }

    async fn fetch_log_tail(
        &self,
        _id: &str,
        _tail: u32,
    ) -> Result<mpsc::Receiver<Result<Bytes, WatcherError>>, WatcherError> {
        if self.fail_logs {
            return Err(WatcherError::LogTransport(
                "mock log fetch failure".to_owned(),
            ));
        }
        let (tx, rx) = mpsc::channel(self.log_chunks.len().max(1));
        for chunk in &self.log_chunks {
            let _ = tx.try_send(Ok(chunk.clone()));
        }
        Ok(rx)
    }

    async fn ping(&self) -> Result<(), WatcherError> {
        if self.fail_ping {
            return Err(WatcherError::DockerConnection("mock ping failure".to_owned()));
        }
        Ok(())
    }
}
