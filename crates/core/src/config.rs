//! 설정 관리 — lastwords.toml 파싱 및 런타임 설정
//!
//! [`LastwordsConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LASTWORDS_WATCHER_LOG_TAIL=50` 형식)
//! 3. 설정 파일 (`lastwords.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), lastwords_core::error::LastwordsError> {
//! use lastwords_core::config::LastwordsConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LastwordsConfig::load("lastwords.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LastwordsConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LastwordsError};

/// log_tail 상한 (행)
const MAX_LOG_TAIL: u32 = 10_000;
/// 이벤트 채널 버퍼 상한
const MAX_EVENT_BUFFER: usize = 65_536;
/// 알림 요청 타임아웃 상한 (초)
const MAX_NOTIFY_TIMEOUT_SECS: u64 = 300;
/// 알림 재시도 상한
const MAX_NOTIFY_RETRIES: u32 = 10;

/// lastwords 통합 설정
///
/// `lastwords.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LastwordsConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 컨테이너 watcher 설정
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// 알림 전송 설정
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl LastwordsConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LastwordsError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LastwordsError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LastwordsError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LastwordsError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LastwordsError> {
        toml::from_str(toml_str).map_err(|e| {
            LastwordsError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LASTWORDS_{SECTION}_{FIELD}`
    /// 예: `LASTWORDS_WATCHER_LOG_TAIL=50`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LASTWORDS_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LASTWORDS_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "LASTWORDS_GENERAL_PID_FILE");

        // Watcher
        override_string(
            &mut self.watcher.docker_socket,
            "LASTWORDS_WATCHER_DOCKER_SOCKET",
        );
        override_u32(&mut self.watcher.log_tail, "LASTWORDS_WATCHER_LOG_TAIL");
        override_usize(
            &mut self.watcher.event_buffer,
            "LASTWORDS_WATCHER_EVENT_BUFFER",
        );

        // Notify
        override_string(&mut self.notify.transport, "LASTWORDS_NOTIFY_TRANSPORT");
        override_string(&mut self.notify.webhook_url, "LASTWORDS_NOTIFY_WEBHOOK_URL");
        override_string(
            &mut self.notify.webhook_format,
            "LASTWORDS_NOTIFY_WEBHOOK_FORMAT",
        );
        override_u64(&mut self.notify.timeout_secs, "LASTWORDS_NOTIFY_TIMEOUT_SECS");
        override_u32(&mut self.notify.max_retries, "LASTWORDS_NOTIFY_MAX_RETRIES");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LastwordsError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // watcher 검증
        if self.watcher.docker_socket.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "watcher.docker_socket".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.watcher.log_tail == 0 || self.watcher.log_tail > MAX_LOG_TAIL {
            return Err(ConfigError::InvalidValue {
                field: "watcher.log_tail".to_owned(),
                reason: format!("must be 1-{MAX_LOG_TAIL}"),
            }
            .into());
        }

        if self.watcher.event_buffer == 0 || self.watcher.event_buffer > MAX_EVENT_BUFFER {
            return Err(ConfigError::InvalidValue {
                field: "watcher.event_buffer".to_owned(),
                reason: format!("must be 1-{MAX_EVENT_BUFFER}"),
            }
            .into());
        }

        // notify 검증
        let valid_transports = ["console", "webhook"];
        if !valid_transports.contains(&self.notify.transport.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "notify.transport".to_owned(),
                reason: format!("must be one of: {}", valid_transports.join(", ")),
            }
            .into());
        }

        let valid_webhook_formats = ["json", "form"];
        if !valid_webhook_formats.contains(&self.notify.webhook_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "notify.webhook_format".to_owned(),
                reason: format!("must be one of: {}", valid_webhook_formats.join(", ")),
            }
            .into());
        }

        if self.notify.timeout_secs == 0 || self.notify.timeout_secs > MAX_NOTIFY_TIMEOUT_SECS {
            return Err(ConfigError::InvalidValue {
                field: "notify.timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_NOTIFY_TIMEOUT_SECS}"),
            }
            .into());
        }

        if self.notify.max_retries > MAX_NOTIFY_RETRIES {
            return Err(ConfigError::InvalidValue {
                field: "notify.max_retries".to_owned(),
                reason: format!("must be 0-{MAX_NOTIFY_RETRIES}"),
            }
            .into());
        }

        if self.notify.transport == "webhook" {
            if self.notify.webhook_url.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "notify.webhook_url".to_owned(),
                    reason: "must not be empty when transport is webhook".to_owned(),
                }
                .into());
            }

            if !self.notify.webhook_url.starts_with("http://")
                && !self.notify.webhook_url.starts_with("https://")
            {
                return Err(ConfigError::InvalidValue {
                    field: "notify.webhook_url".to_owned(),
                    reason: "must start with http:// or https://".to_owned(),
                }
                .into());
            }
        }

        Ok(())
    }
}

// Default는 derive 매크로로 자동 생성 (각 필드가 Default를 구현하므로)

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: "/var/run/lastwords.pid".to_owned(),
        }
    }
}

/// 컨테이너 watcher 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Docker 소켓 경로
    pub docker_socket: String,
    /// crash 감지 시 요청할 로그 tail 행 수
    pub log_tail: u32,
    /// 이벤트 채널 버퍼 크기
    pub event_buffer: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            docker_socket: "/var/run/docker.sock".to_owned(),
            log_tail: 100,
            event_buffer: 256,
        }
    }
}

/// 알림 전송 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// 전송 방식 (console, webhook)
    pub transport: String,
    /// webhook URL (transport가 webhook일 때 필수)
    pub webhook_url: String,
    /// webhook 본문 형식 (json, form)
    pub webhook_format: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 전송 실패 시 재시도 횟수
    pub max_retries: u32,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            transport: "console".to_owned(),
            webhook_url: String::new(),
            webhook_format: "json".to_owned(),
            timeout_secs: 10,
            max_retries: 2,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = LastwordsConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.watcher.docker_socket, "/var/run/docker.sock");
        assert_eq!(config.watcher.log_tail, 100);
        assert_eq!(config.notify.transport, "console");
    }

    #[test]
    fn default_config_passes_validation() {
        let config = LastwordsConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = LastwordsConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.watcher.log_tail, 100);
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[general]
log_level = "debug"

[watcher]
log_tail = 50
"#;
        let config = LastwordsConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        // log_format은 기본값 유지
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.watcher.log_tail, 50);
        assert_eq!(config.watcher.event_buffer, 256);
    }

    #[test]
    fn from_str_full_toml() {
        let toml = r#"
[general]
log_level = "warn"
log_format = "pretty"
pid_file = "/opt/lastwords/lastwords.pid"

[watcher]
docker_socket = "/run/docker.sock"
log_tail = 200
event_buffer = 1024

[notify]
transport = "webhook"
webhook_url = "https://hooks.example.com/T000/B000"
webhook_format = "form"
timeout_secs = 5
max_retries = 3
"#;
        let config = LastwordsConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.watcher.docker_socket, "/run/docker.sock");
        assert_eq!(config.watcher.log_tail, 200);
        assert_eq!(config.notify.transport, "webhook");
        assert_eq!(config.notify.webhook_format, "form");
        assert_eq!(config.notify.max_retries, 3);
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let result = LastwordsConfig::parse("invalid = [[[toml");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            LastwordsError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = LastwordsConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = LastwordsConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_empty_docker_socket() {
        let mut config = LastwordsConfig::default();
        config.watcher.docker_socket = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("docker_socket"));
    }

    #[test]
    fn validate_rejects_zero_log_tail() {
        let mut config = LastwordsConfig::default();
        config.watcher.log_tail = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_tail"));
    }

    #[test]
    fn validate_rejects_excessive_log_tail() {
        let mut config = LastwordsConfig::default();
        config.watcher.log_tail = 10_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_boundary_log_tail() {
        let mut config = LastwordsConfig::default();
        config.watcher.log_tail = 10_000;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_event_buffer() {
        let mut config = LastwordsConfig::default();
        config.watcher.event_buffer = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_invalid_transport() {
        let mut config = LastwordsConfig::default();
        config.notify.transport = "carrier-pigeon".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("transport"));
    }

    #[test]
    fn validate_rejects_webhook_without_url() {
        let mut config = LastwordsConfig::default();
        config.notify.transport = "webhook".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("webhook_url"));
    }

    #[test]
    fn validate_rejects_webhook_with_bad_scheme() {
        let mut config = LastwordsConfig::default();
        config.notify.transport = "webhook".to_owned();
        config.notify.webhook_url = "ftp://hooks.example.com/x".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn validate_accepts_webhook_with_https_url() {
        let mut config = LastwordsConfig::default();
        config.notify.transport = "webhook".to_owned();
        config.notify.webhook_url = "https://hooks.example.com/x".to_owned();
        config.validate().unwrap();
    }

    #[test]
    fn validate_ignores_webhook_url_for_console_transport() {
        let mut config = LastwordsConfig::default();
        config.notify.webhook_url = String::new();
        // transport가 console이면 webhook_url 검증을 건너뜀
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = LastwordsConfig::default();
        config.notify.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_excessive_retries() {
        let mut config = LastwordsConfig::default();
        config.notify.max_retries = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_LASTWORDS_STR", "overridden") };
        override_string(&mut val, "TEST_LASTWORDS_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_LASTWORDS_STR") };
    }

    #[test]
    fn env_override_u32_valid() {
        let mut val = 100u32;
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_LASTWORDS_U32", "42") };
        override_u32(&mut val, "TEST_LASTWORDS_U32");
        assert_eq!(val, 42);
        unsafe { std::env::remove_var("TEST_LASTWORDS_U32") };
    }

    #[test]
    fn env_override_u32_invalid_keeps_original() {
        let mut val = 100u32;
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_LASTWORDS_U32_BAD", "not-a-number") };
        override_u32(&mut val, "TEST_LASTWORDS_U32_BAD");
        assert_eq!(val, 100); // 원래 값 유지
        unsafe { std::env::remove_var("TEST_LASTWORDS_U32_BAD") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_LASTWORDS_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = LastwordsConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = LastwordsConfig::parse(&toml_str).unwrap();
        assert_eq!(config.general.log_level, parsed.general.log_level);
        assert_eq!(config.watcher.log_tail, parsed.watcher.log_tail);
        assert_eq!(config.notify.transport, parsed.notify.transport);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let result = LastwordsConfig::from_file("/nonexistent/path/lastwords.toml").await;
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            LastwordsError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
