//! 컨테이너 watcher 오케스트레이터 -- 부트스트랩/이벤트 소비/알림 전체 흐름 관리
//!
//! [`ContainerWatcher`]는 daemon이 구동하는 [`Pipeline`] 구현체입니다.
//! 시작 시 레지스트리를 부트스트랩하고 이벤트 스트림을 구독한 뒤,
//! [`Reconciler`]를 백그라운드 태스크로 띄워 이벤트를 소비합니다.
//!
//! 이벤트 스트림이 끊기면 reconciler 태스크가 종료되고, 이후의
//! health check가 unhealthy를 보고합니다. 재구독 대신 프로세스 재기동에
//! 맡기는 단순한 복구 모델입니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lastwords_core::error::{LastwordsError, PipelineError};
use lastwords_core::pipeline::{HealthStatus, Pipeline};
use tracing::{info, warn};

use crate::config::ContainerWatcherConfig;
use crate::docker::DockerClient;
use crate::error::WatcherError;
use crate::notify::Notifier;
use crate::reconciler::Reconciler;

/// watcher 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatcherState {
    /// 생성됨, 시작 전
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 컨테이너 crash-loop watcher 파이프라인
///
/// [`ContainerWatcherBuilder`]로 생성합니다. `start()`는 한 번만 호출할
/// 수 있으며, 정지 후 다시 시작하려면 watcher를 새로 만들어야 합니다.
pub struct ContainerWatcher<D: DockerClient, N: Notifier> {
    config: ContainerWatcherConfig,
    state: WatcherState,
    docker: Arc<D>,
    reconciler: Option<Reconciler<D, N>>,
    run_task: Option<tokio::task::JoinHandle<Result<(), WatcherError>>>,
    events_processed: Arc<AtomicU64>,
    crashes_detected: Arc<AtomicU64>,
    notification_failures: Arc<AtomicU64>,
}

impl<D: DockerClient, N: Notifier> ContainerWatcher<D, N> {
    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &'static str {
        match self.state {
            WatcherState::Initialized => "initialized",
            WatcherState::Running => "running",
            WatcherState::Stopped => "stopped",
        }
    }

    /// 처리한 이벤트 수
    pub fn events_processed(&self) -> u64 {
        self.events_processed.load(Ordering::Relaxed)
    }

    /// 감지한 crash-restart 수
    pub fn crashes_detected(&self) -> u64 {
        self.crashes_detected.load(Ordering::Relaxed)
    }

    /// 알림 전송 실패 수
    pub fn notification_failures(&self) -> u64 {
        self.notification_failures.load(Ordering::Relaxed)
    }
}

impl<D: DockerClient, N: Notifier> Pipeline for ContainerWatcher<D, N> {
    async fn start(&mut self) -> Result<(), LastwordsError> {
        if self.state == WatcherState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!("starting container watcher");

        if self.docker.ping().await.is_err() {
            warn!("docker daemon not reachable, watcher start may fail");
        }

        let mut reconciler = self.reconciler.take().ok_or(LastwordsError::Pipeline(
            PipelineError::InitFailed(
                "reconciler not available (was it consumed by a previous start? \
                 rebuild the watcher to restart)"
                    .to_owned(),
            ),
        ))?;

        let seeded = reconciler.bootstrap().await?;
        info!(seeded, "initial container inventory seeded");

        let events = self.docker.subscribe_events(self.config.event_buffer).await?;

        self.run_task = Some(tokio::spawn(reconciler.run(events)));
        self.state = WatcherState::Running;
        info!("container watcher started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LastwordsError> {
        if self.state != WatcherState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping container watcher");

        if let Some(task) = self.run_task.take() {
            task.abort();
            let _ = task.await;
        }

        self.state = WatcherState::Stopped;
        info!("container watcher stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            WatcherState::Running => {
                // reconciler 태스크 종료 = 이벤트 스트림 단절
                if self.run_task.as_ref().is_some_and(|t| t.is_finished()) {
                    return HealthStatus::Unhealthy("event stream closed".to_owned());
                }
                if self.docker.ping().await.is_ok() {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded("docker daemon not reachable".to_owned())
                }
            }
            WatcherState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            WatcherState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 컨테이너 watcher 빌더
///
/// Docker 클라이언트와 알림 전송기는 필수입니다.
///
/// # 사용 예시
///
/// ```ignore
/// use std::sync::Arc;
/// use lastwords_watcher::{BollardDockerClient, ConsoleNotifier, ContainerWatcherBuilder};
///
/// let docker = Arc::new(BollardDockerClient::connect_local()?);
/// let notifier = Arc::new(ConsoleNotifier::new());
///
/// let watcher = ContainerWatcherBuilder::new()
///     .docker_client(docker)
///     .notifier(notifier)
///     .build()?;
/// # Ok::<(), lastwords_watcher::WatcherError>(())
/// ```
pub struct ContainerWatcherBuilder<D: DockerClient, N: Notifier> {
    config: ContainerWatcherConfig,
    docker: Option<Arc<D>>,
    notifier: Option<Arc<N>>,
}

impl<D: DockerClient, N: Notifier> Default for ContainerWatcherBuilder<D, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DockerClient, N: Notifier> ContainerWatcherBuilder<D, N> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ContainerWatcherConfig::default(),
            docker: None,
            notifier: None,
        }
    }

    /// watcher 설정을 지정합니다.
    pub fn config(mut self, config: ContainerWatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Docker 클라이언트를 지정합니다. (필수)
    pub fn docker_client(mut self, docker: Arc<D>) -> Self {
        self.docker = Some(docker);
        self
    }

    /// 알림 전송기를 지정합니다. (필수)
    pub fn notifier(mut self, notifier: Arc<N>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 설정을 검증하고 watcher를 생성합니다.
    ///
    /// # Errors
    ///
    /// 설정이 유효하지 않거나 필수 의존성이 빠진 경우
    /// [`WatcherError::Config`]를 반환합니다.
    pub fn build(self) -> Result<ContainerWatcher<D, N>, WatcherError> {
        self.config.validate()?;

        let docker = self.docker.ok_or_else(|| WatcherError::Config {
            field: "docker_client".to_owned(),
            reason: "docker client must be provided".to_owned(),
        })?;
        let notifier = self.notifier.ok_or_else(|| WatcherError::Config {
            field: "notifier".to_owned(),
            reason: "notifier must be provided".to_owned(),
        })?;

        let reconciler = Reconciler::new(Arc::clone(&docker), notifier, self.config.log_tail);
        let events_processed = reconciler.events_processed_handle();
        let crashes_detected = reconciler.crashes_detected_handle();
        let notification_failures = reconciler.notification_failures_handle();

        Ok(ContainerWatcher {
            config: self.config,
            state: WatcherState::Initialized,
            docker,
            reconciler: Some(reconciler),
            run_task: None,
            events_processed,
            crashes_detected,
            notification_failures,
        })
    }
}
