//! 에러 타입 — 도메인별 에러 정의

/// lastwords 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LastwordsError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 컨테이너 모니터링 에러
    #[error("monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중인 파이프라인을 다시 시작함
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 파이프라인을 정지함
    #[error("pipeline not running")]
    NotRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// 컨테이너 모니터링 에러
///
/// watcher 크레이트의 세부 에러가 상위 레이어로 전파될 때 쓰는 축약 형태입니다.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Docker API 호출 실패
    #[error("docker api error: {0}")]
    DockerApi(String),

    /// 컨테이너를 찾을 수 없음
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// 이벤트 스트림 단절
    #[error("event stream error: {0}")]
    EventStream(String),

    /// 로그 스트림 디코딩 실패
    #[error("log decode error: {0}")]
    LogDecode(String),

    /// 알림 전송 실패
    #[error("notify error: {0}")]
    Notify(String),
}
