//! 컨테이너 watcher 에러 타입

use lastwords_core::error::{ConfigError, LastwordsError, MonitorError};

/// 컨테이너 watcher 에러
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// Docker API 호출 실패
    #[error("docker api error: {0}")]
    DockerApi(String),

    /// Docker 데몬 연결 실패
    #[error("docker connection failed: {0}")]
    DockerConnection(String),

    /// 컨테이너를 찾을 수 없음
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// 이벤트 스트림 구독 실패 또는 단절
    #[error("event stream error: {0}")]
    EventStream(String),

    /// 로그 프레이밍 디코딩 실패
    #[error("log decode error: {0}")]
    LogDecode(String),

    /// 로그 전송 계층 실패 (HTTP/소켓)
    #[error("log transport error: {0}")]
    LogTransport(String),

    /// 알림 전송 실패
    #[error("notification delivery failed: {0}")]
    Notify(String),

    /// 설정 오류
    #[error("invalid watcher config '{field}': {reason}")]
    Config { field: String, reason: String },
}

/// tokio-util의 `Decoder` 계약이 요구하는 변환.
/// 프레이밍 중의 입출력 실패는 전송 계층 에러로 취급합니다.
impl From<std::io::Error> for WatcherError {
    fn from(err: std::io::Error) -> Self {
        WatcherError::LogTransport(err.to_string())
    }
}

/// WatcherError를 core 에러 체계로 변환
///
/// daemon은 [`LastwordsError`]만 다루므로, 세부 variant를
/// [`MonitorError`]의 축약 형태로 접어서 전달합니다.
impl From<WatcherError> for LastwordsError {
    fn from(err: WatcherError) -> Self {
        match &err {
            WatcherError::DockerApi(msg) => {
                LastwordsError::Monitor(MonitorError::DockerApi(msg.clone()))
            }
            WatcherError::DockerConnection(msg) => {
                LastwordsError::Monitor(MonitorError::DockerApi(msg.clone()))
            }
            WatcherError::ContainerNotFound(id) => {
                LastwordsError::Monitor(MonitorError::ContainerNotFound(id.clone()))
            }
            WatcherError::EventStream(msg) => {
                LastwordsError::Monitor(MonitorError::EventStream(msg.clone()))
            }
            WatcherError::LogDecode(msg) => {
                LastwordsError::Monitor(MonitorError::LogDecode(msg.clone()))
            }
            WatcherError::LogTransport(msg) => {
                LastwordsError::Monitor(MonitorError::DockerApi(msg.clone()))
            }
            WatcherError::Notify(msg) => {
                LastwordsError::Monitor(MonitorError::Notify(msg.clone()))
            }
            WatcherError::Config { field, reason } => {
                LastwordsError::Config(ConfigError::InvalidValue {
                    field: field.clone(),
                    reason: reason.clone(),
                })
            }
        }
    }
}
