//! 컨테이너 watcher 설정
//!
//! [`ContainerWatcherConfig`]는 core의 [`WatcherConfig`](lastwords_core::config::WatcherConfig)를
//! 기반으로 watcher 파이프라인이 사용하는 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use lastwords_core::config::LastwordsConfig;
//! use lastwords_watcher::config::ContainerWatcherConfig;
//!
//! let core_config = LastwordsConfig::default();
//! let config = ContainerWatcherConfig::from_core(&core_config.watcher);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::WatcherError;

/// 컨테이너 watcher 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerWatcherConfig {
    /// Docker 소켓 경로
    pub docker_socket: String,
    /// crash 감지 시 요청할 로그 tail 행 수
    pub log_tail: u32,
    /// 이벤트 채널 버퍼 크기
    pub event_buffer: usize,
}

impl Default for ContainerWatcherConfig {
    fn default() -> Self {
        Self {
            docker_socket: "/var/run/docker.sock".to_owned(),
            log_tail: 100,
            event_buffer: 256,
        }
    }
}

/// 설정 상한값 상수
const MAX_LOG_TAIL: u32 = 10_000;
const MAX_EVENT_BUFFER: usize = 65_536;

impl ContainerWatcherConfig {
    /// core의 `WatcherConfig`에서 watcher 설정을 생성합니다.
    pub fn from_core(core: &lastwords_core::config::WatcherConfig) -> Self {
        Self {
            docker_socket: core.docker_socket.clone(),
            log_tail: core.log_tail,
            event_buffer: core.event_buffer,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), WatcherError> {
        if self.docker_socket.is_empty() {
            return Err(WatcherError::Config {
                field: "docker_socket".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.log_tail == 0 || self.log_tail > MAX_LOG_TAIL {
            return Err(WatcherError::Config {
                field: "log_tail".to_owned(),
                reason: format!("must be 1-{MAX_LOG_TAIL}"),
            });
        }

        if self.event_buffer == 0 || self.event_buffer > MAX_EVENT_BUFFER {
            return Err(WatcherError::Config {
                field: "event_buffer".to_owned(),
                reason: format!("must be 1-{MAX_EVENT_BUFFER}"),
            });
        }

        Ok(())
    }
}

/// 컨테이너 watcher 설정 빌더
#[derive(Default)]
pub struct ContainerWatcherConfigBuilder {
    config: ContainerWatcherConfig,
}

impl ContainerWatcherConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// Docker 소켓 경로를 설정합니다.
    pub fn docker_socket(mut self, socket: impl Into<String>) -> Self {
        self.config.docker_socket = socket.into();
        self
    }

    /// 로그 tail 행 수를 설정합니다.
    pub fn log_tail(mut self, tail: u32) -> Self {
        self.config.log_tail = tail;
        self
    }

    /// 이벤트 채널 버퍼 크기를 설정합니다.
    pub fn event_buffer(mut self, buffer: usize) -> Self {
        self.config.event_buffer = buffer;
        self
    }

    /// 설정을 검증하고 `ContainerWatcherConfig`를 생성합니다.
    pub fn build(self) -> Result<ContainerWatcherConfig, WatcherError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
