//! 알림 전송 -- crash 알림 메시지 전달 수단
//!
//! [`Notifier`]는 완성된 메시지 문자열을 받아 전달하는 단일 연산만
//! 정의합니다. 전달은 fire-and-forget이며, 실패는 호출자가 카운터와
//! 로그로만 남기고 재전송하지 않습니다.
//!
//! 구현체는 stdout에 출력하는 [`ConsoleNotifier`]와 Slack 호환
//! webhook으로 POST하는 [`WebhookNotifier`] 두 가지입니다. 런타임에
//! 설정으로 고르는 자리에는 [`AnyNotifier`]를 사용합니다.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::WatcherError;

/// 알림 전송 trait
///
/// `Send + Sync + 'static`으로 reconciler 태스크에서 안전하게 공유됩니다.
pub trait Notifier: Send + Sync + 'static {
    /// 메시지 한 건을 전달합니다.
    ///
    /// 멀티라인 메시지(로그 tail 포함)가 그대로 들어오며, 구현체는
    /// 내용을 가공하지 않고 전달만 합니다.
    fn notify(&self, message: &str) -> impl Future<Output = Result<(), WatcherError>> + Send;
}

/// 콘솔 알림 -- 메시지를 stdout에 그대로 출력합니다.
///
/// 구조화 로그와 섞이지 않도록 tracing 대신 stdout을 직접 씁니다.
#[derive(Debug, Default, Clone)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for ConsoleNotifier {
    async fn notify(&self, message: &str) -> Result<(), WatcherError> {
        println!("{message}");
        Ok(())
    }
}

/// webhook 본문 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookFormat {
    /// JSON 본문: `{"text": "..."}`
    Json,
    /// form-encoded 본문: `text=...`
    Form,
}

impl WebhookFormat {
    /// 설정 문자열을 형식으로 변환합니다. 대소문자를 무시합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "form" => Some(Self::Form),
            _ => None,
        }
    }
}

/// 재시도 백오프 기본 간격
const RETRY_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// HTTP webhook 알림 -- Slack incoming webhook 호환 POST 전송
///
/// 메시지를 `text` 필드 하나로 감싸 JSON 또는 form-encoded 본문으로
/// 보냅니다. 요청마다 타임아웃이 적용되고, 실패하면 선형 백오프로
/// 제한된 횟수만큼 재시도합니다.
#[derive(Debug)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    format: WebhookFormat,
    max_retries: u32,
    retry_backoff_base: Duration,
}

impl WebhookNotifier {
    /// 새 webhook 전송기를 생성합니다.
    ///
    /// # Errors
    ///
    /// URL이 http/https가 아니거나 HTTP 클라이언트 생성에 실패하면
    /// 에러를 반환합니다.
    pub fn new(
        url: impl Into<String>,
        format: WebhookFormat,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, WatcherError> {
        let url = url.into();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(WatcherError::Config {
                field: "webhook_url".to_owned(),
                reason: "must start with http:// or https://".to_owned(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WatcherError::Notify(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            url,
            format,
            max_retries,
            retry_backoff_base: RETRY_BACKOFF_BASE,
        })
    }

    /// core의 `NotifyConfig`에서 webhook 전송기를 생성합니다.
    pub fn from_core(config: &lastwords_core::config::NotifyConfig) -> Result<Self, WatcherError> {
        let format =
            WebhookFormat::from_str_loose(&config.webhook_format).ok_or_else(|| {
                WatcherError::Config {
                    field: "webhook_format".to_owned(),
                    reason: "must be one of: json, form".to_owned(),
                }
            })?;
        Self::new(
            config.webhook_url.clone(),
            format,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )
    }

    /// 단일 전송 시도 (재시도 없음)
    async fn post_once(&self, message: &str) -> Result<(), WatcherError> {
        let request = match self.format {
            WebhookFormat::Json => self
                .client
                .post(&self.url)
                .json(&serde_json::json!({ "text": message })),
            WebhookFormat::Form => self.client.post(&self.url).form(&[("text", message)]),
        };

        let response = request
            .send()
            .await
            .map_err(|e| WatcherError::Notify(format!("webhook request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WatcherError::Notify(format!(
                "webhook returned status {status}"
            )));
        }
        Ok(())
    }
}

impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) -> Result<(), WatcherError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_base * attempt;
                warn!(
                    attempt = attempt,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    "retrying webhook delivery"
                );
                tokio::time::sleep(backoff).await;
            }

            match self.post_once(message).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| WatcherError::Notify("webhook delivery failed".to_owned())))
    }
}

/// 런타임 선택 가능한 알림 전송기
///
/// [`Notifier`]의 메서드는 `impl Future`를 반환하므로 트레이트 객체로
/// 만들 수 없습니다. 설정에 따라 전송기를 골라야 하는 daemon을 위해
/// enum 디스패치로 감쌉니다.
pub enum AnyNotifier {
    Console(ConsoleNotifier),
    Webhook(WebhookNotifier),
}

impl AnyNotifier {
    /// core의 `NotifyConfig`에서 알림 전송기를 생성합니다.
    ///
    /// # Errors
    ///
    /// transport 이름이 알려진 값이 아니거나 webhook 설정이 잘못된 경우
    /// 에러를 반환합니다.
    pub fn from_config(config: &lastwords_core::config::NotifyConfig) -> Result<Self, WatcherError> {
        match config.transport.as_str() {
            "console" => Ok(Self::Console(ConsoleNotifier::new())),
            "webhook" => Ok(Self::Webhook(WebhookNotifier::from_core(config)?)),
            other => Err(WatcherError::Config {
                field: "transport".to_owned(),
                reason: format!("unknown notify transport '{other}'"),
            }),
        }
    }
}

impl Notifier for AnyNotifier {
    async fn notify(&self, message: &str) -> Result<(), WatcherError> {
        match self {
            Self::Console(n) => n.notify(message).await,
            Self::Webhook(n) => n.notify(message).await,
        }
    }
}

/// 테스트용 기록 알림 전송기
///
/// 전달된 메시지를 순서대로 기록하고, 설정에 따라 실패를 시뮬레이션합니다.
#[cfg(test)]
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    messages: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    fail: bool,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// notify가 항상 실패하도록 설정합니다. 메시지는 기록됩니다.
    pub fn failing() -> Self {
        Self {
            messages: std::sync::Arc::default(),
            fail: true,
        }
    }

    /// 지금까지 기록된 메시지의 복사본을 반환합니다.
    pub fn recorded(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> Result<(), WatcherError> {
        self.messages.lock().unwrap().push(message.to_owned());
        if self.fail {
            return Err(WatcherError::Notify("mock notify failure".to_owned()));
        }
        Ok(())
    }
}
