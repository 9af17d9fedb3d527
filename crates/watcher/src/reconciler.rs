//! 이벤트 reconciler -- 생명주기 이벤트를 레지스트리 상태 전이로 적용
//!
//! [`Reconciler`]는 이 크레이트의 핵심 상태 기계입니다. Docker 이벤트
//! 스트림을 순차적으로 소비하면서 `die` 직후의 `start`를 crash-restart로
//! 판정하고, 해당 컨테이너의 로그 tail을 수집해 알림을 보냅니다.
//!
//! # 순차 처리 계약
//!
//! 이벤트는 단일 태스크에서 한 건씩 끝까지 처리됩니다. 한 이벤트가
//! 유발하는 inspect/로그 조회가 모두 끝나야 다음 이벤트를 꺼냅니다.
//! 이 직렬화 덕분에 [`Registry`]에 잠금이 필요 없고, 같은 컨테이너의
//! 상태 전이가 데몬이 내보낸 순서 그대로 적용됩니다. die→start 판정은
//! 이 순서 보장 위에서만 성립합니다.
//!
//! # 이벤트별 에러 격리
//!
//! 단일 이벤트 처리 실패(이벤트와 후속 inspect/로그 조회 사이에
//! 컨테이너가 사라진 경우 등)는 루프를 멈추지 않습니다. 캐시된
//! 메타데이터로 축약 알림을 보내고 다음 이벤트로 넘어갑니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lastwords_core::types::LifecycleAction;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::docker::{ContainerEvent, DockerClient};
use crate::error::WatcherError;
use crate::logs::collect_tail;
use crate::notify::Notifier;
use crate::policy::is_trackable;
use crate::registry::{ContainerRecord, Registry};

/// 레코드가 없을 때 알림에 쓰는 대체 이름/이미지
const UNKNOWN_SENTINEL: &str = "unknown";

/// 이벤트 reconciler
///
/// [`Registry`]를 단독 소유하며, 부트스트랩 시드와 이벤트 루프 양쪽에서
/// 같은 레지스트리를 씁니다. 부트스트랩은 항상 [`run`](Self::run) 이전에
/// 호출되므로 별도 동기화가 필요 없습니다.
pub struct Reconciler<D: DockerClient, N: Notifier> {
    docker: Arc<D>,
    notifier: Arc<N>,
    registry: Registry,
    log_tail: u32,
    events_processed: Arc<AtomicU64>,
    crashes_detected: Arc<AtomicU64>,
    notification_failures: Arc<AtomicU64>,
}

impl<D: DockerClient, N: Notifier> Reconciler<D, N> {
    /// 새 reconciler를 생성합니다.
    ///
    /// `log_tail`은 crash 감지 시 요청할 로그 행 수입니다.
    pub fn new(docker: Arc<D>, notifier: Arc<N>, log_tail: u32) -> Self {
        Self {
            docker,
            notifier,
            registry: Registry::new(),
            log_tail,
            events_processed: Arc::new(AtomicU64::new(0)),
            crashes_detected: Arc::new(AtomicU64::new(0)),
            notification_failures: Arc::new(AtomicU64::new(0)),
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

    /// 추적 중인 컨테이너 수
    pub fn tracked_containers(&self) -> usize {
        self.registry.len()
    }

    pub(crate) fn events_processed_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.events_processed)
    }

    pub(crate) fn crashes_detected_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.crashes_detected)
    }

    pub(crate) fn notification_failures_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.notification_failures)
    }

    /// 실행 중인 컨테이너를 조사해 레지스트리를 시드합니다.
    ///
    /// 추적 대상 정책을 가진 컨테이너만 등록하며, 이미 재시작 사이클
    /// 중인(`restarting`) 컨테이너는 `die` 상태로 시드해 다음 `start`
    /// 이벤트에서 crash로 잡히게 합니다.
    ///
    /// 개별 컨테이너의 inspect 실패는 해당 컨테이너만 건너뜁니다.
    /// 목록 조회 자체가 실패하면 에러를 반환하며, 이는 호출자가
    /// 기동 실패로 처리해야 합니다.
    ///
    /// 시드된 컨테이너 수를 반환합니다.
    pub async fn bootstrap(&mut self) -> Result<usize, WatcherError> {
        let containers = self.docker.list_running().await?;
        let mut seeded = 0usize;

        for summary in containers {
            let details = match self.docker.inspect_container(&summary.id).await {
                Ok(details) => details,
                Err(e) => {
                    warn!(
                        container_id = %summary.id,
                        error = %e,
                        "failed to inspect container during bootstrap, skipping"
                    );
                    continue;
                }
            };

            if !is_trackable(&details.restart_policy) {
                debug!(
                    container_id = %details.id,
                    policy = %details.restart_policy,
                    "restart policy not trackable, ignoring container"
                );
                continue;
            }

            let last_action = if details.state == "restarting" {
                LifecycleAction::Die
            } else {
                LifecycleAction::Start
            };

            let inserted = self.registry.insert(ContainerRecord {
                id: details.id.clone(),
                name: details.name,
                image: details.image,
                restart_policy: details.restart_policy,
                restart_count: details.restart_count,
                last_action,
            });
            if inserted {
                seeded += 1;
            }
        }

        info!(seeded, "container registry bootstrapped");
        Ok(seeded)
    }

    /// 이벤트 스트림을 순차 소비합니다.
    ///
    /// 채널이 닫히면 `Ok(())`로 반환됩니다. 스트림 종료를 치명적으로
    /// 다룰지는 호출자(파이프라인)의 몫입니다. 단일 이벤트의 실패는
    /// 여기서 격리되어 루프를 멈추지 않습니다.
    pub async fn run(mut self, mut events: mpsc::Receiver<ContainerEvent>) -> Result<(), WatcherError> {
        while let Some(event) = events.recv().await {
            self.events_processed.fetch_add(1, Ordering::Relaxed);

            if let Err(e) = self.handle_event(&event).await {
                warn!(
                    container_id = %event.container_id,
                    action = %event.action,
                    error = %e,
                    "event handling failed, sending degraded notification"
                );
                self.notify_degraded(&event.container_id).await;
            }
        }

        info!("container event stream closed");
        Ok(())
    }

    /// 단일 이벤트를 레지스트리 상태 전이로 적용합니다.
    async fn handle_event(&mut self, event: &ContainerEvent) -> Result<(), WatcherError> {
        debug!(
            container_id = %event.container_id,
            action = %event.action,
            "processing container event"
        );

        match event.action {
            LifecycleAction::Start => self.handle_start(&event.container_id).await,
            LifecycleAction::Destroy => {
                if self.registry.remove(&event.container_id).is_some() {
                    info!(
                        container_id = %event.container_id,
                        "container destroyed, dropped from registry"
                    );
                }
                Ok(())
            }
            action => {
                // 나머지 액션은 진단용 최신 상태 기록만 갱신한다
                if let Some(record) = self.registry.get_mut(&event.container_id) {
                    record.last_action = action;
                }
                Ok(())
            }
        }
    }

    async fn handle_start(&mut self, container_id: &str) -> Result<(), WatcherError> {
        let last_action = self.registry.get(container_id).map(|r| r.last_action);

        match last_action {
            Some(LifecycleAction::Die) => self.handle_crash(container_id).await,
            Some(_) => {
                // stop 후 수동 start 등 정상 기동, 알림 없음
                if let Some(record) = self.registry.get_mut(container_id) {
                    record.last_action = LifecycleAction::Start;
                }
                Ok(())
            }
            None => self.seed_from_start(container_id).await,
        }
    }

    /// die 직후의 start = crash-restart 판정
    async fn handle_crash(&mut self, container_id: &str) -> Result<(), WatcherError> {
        // 로그 수집 전에 레코드부터 갱신한다. 이후 단계가 실패해도
        // 관측된 start는 반영되어 다음 start가 이중 계상되지 않는다.
        let (name, image, restart_count) = {
            let record = self
                .registry
                .get_mut(container_id)
                .ok_or_else(|| WatcherError::ContainerNotFound(container_id.to_owned()))?;
            record.restart_count += 1;
            record.last_action = LifecycleAction::Start;
            (record.name.clone(), record.image.clone(), record.restart_count)
        };

        self.crashes_detected.fetch_add(1, Ordering::Relaxed);
        info!(
            container_id = %container_id,
            name = %name,
            restart_count,
            "container crash-restart detected"
        );

        let chunks = self.docker.fetch_log_tail(container_id, self.log_tail).await?;
        let logs = collect_tail(chunks).await?;

        let times = if restart_count == 1 {
            "once".to_owned()
        } else {
            format!("{restart_count} times")
        };
        let message = format!(
            "Container {name} ({container_id})[{image}] may have died ({times}), its last words:\n{logs}"
        );

        if let Err(e) = self.notifier.notify(&message).await {
            self.notification_failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                container_id = %container_id,
                error = %e,
                "failed to deliver crash notification"
            );
        }

        Ok(())
    }

    /// 레지스트리에 없는 ID의 start -- inspect 후 추적 대상이면 시드
    async fn seed_from_start(&mut self, container_id: &str) -> Result<(), WatcherError> {
        let details = self.docker.inspect_container(container_id).await?;

        if !is_trackable(&details.restart_policy) {
            debug!(
                container_id = %container_id,
                policy = %details.restart_policy,
                "restart policy not trackable, ignoring container"
            );
            return Ok(());
        }

        self.registry.insert(ContainerRecord {
            id: details.id.clone(),
            name: details.name,
            image: details.image,
            restart_policy: details.restart_policy,
            restart_count: details.restart_count,
            last_action: LifecycleAction::Start,
        });
        info!(container_id = %container_id, "tracking newly started container");
        Ok(())
    }

    /// 이벤트 처리 실패 시 캐시된 메타데이터로 축약 알림을 보냅니다.
    ///
    /// 레코드가 없으면 이름/이미지에 `unknown`을 씁니다. 전송 실패는
    /// 카운터와 로그로만 남깁니다.
    async fn notify_degraded(&self, container_id: &str) {
        let (name, image) = match self.registry.get(container_id) {
            Some(record) => (record.name.clone(), record.image.clone()),
            None => (UNKNOWN_SENTINEL.to_owned(), UNKNOWN_SENTINEL.to_owned()),
        };

        let message = format!(
            "Container {name} ({container_id})[{image}] may have died, and it is failing fast."
        );

        if let Err(e) = self.notifier.notify(&message).await {
            self.notification_failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                container_id = %container_id,
                error = %e,
                "failed to deliver degraded crash notification"
            );
        }
    }
}
