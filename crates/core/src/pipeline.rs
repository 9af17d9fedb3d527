//! 파이프라인 trait — daemon이 모듈을 구동하는 공통 생명주기 계약
//!
//! [`Pipeline`]은 시작/정지/헬스체크를 정의합니다. async trait 메서드는
//! 트레이트 객체로 만들 수 없으므로, daemon처럼 모듈을 `Box`에 담아야 하는
//! 경우를 위해 [`DynPipeline`]이 블랭킷 구현으로 제공됩니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::LastwordsError;

/// [`DynPipeline`]이 반환하는 boxed future 별칭
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 생명주기 trait
///
/// `start`는 모듈을 실행 상태로 전환하고, `stop`은 정상 종료시키며,
/// `health_check`는 부작용 없이 현재 상태를 보고합니다.
pub trait Pipeline: Send {
    /// 모듈을 시작합니다. 이미 실행 중이면 실패합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LastwordsError>> + Send;

    /// 모듈을 정지합니다. 실행 중이 아니면 실패합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LastwordsError>> + Send;

    /// 모듈의 현재 헬스 상태를 보고합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// [`Pipeline`]의 트레이트 객체 호환 형태
///
/// 모든 [`Pipeline`] 구현에 대해 자동 구현되므로 직접 구현할 일은 없습니다.
pub trait DynPipeline: Send {
    /// [`Pipeline::start`] 참고
    fn start(&mut self) -> BoxFuture<'_, Result<(), LastwordsError>>;

    /// [`Pipeline::stop`] 참고
    fn stop(&mut self) -> BoxFuture<'_, Result<(), LastwordsError>>;

    /// [`Pipeline::health_check`] 참고
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), LastwordsError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), LastwordsError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

/// 헬스체크 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상 동작 중
    Healthy,
    /// 동작 중이지만 일부 기능 저하 (사유 포함)
    Degraded(String),
    /// 동작 불능 (사유 포함)
    Unhealthy(String),
}

impl HealthStatus {
    /// [`HealthStatus::Healthy`]인 경우에만 true
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// [`HealthStatus::Unhealthy`]인 경우에만 true
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopPipeline {
        running: bool,
    }

    impl Pipeline for NoopPipeline {
        async fn start(&mut self) -> Result<(), LastwordsError> {
            self.running = true;
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), LastwordsError> {
            self.running = false;
            Ok(())
        }

        async fn health_check(&self) -> HealthStatus {
            if self.running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy("not started".to_owned())
            }
        }
    }

    #[tokio::test]
    async fn pipeline_works_as_trait_object() {
        let mut pipeline: Box<dyn DynPipeline> = Box::new(NoopPipeline { running: false });

        assert!(pipeline.health_check().await.is_unhealthy());
        pipeline.start().await.unwrap();
        assert!(pipeline.health_check().await.is_healthy());
        pipeline.stop().await.unwrap();
        assert!(pipeline.health_check().await.is_unhealthy());
    }

    #[test]
    fn health_status_helpers() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Healthy.is_unhealthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_healthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_unhealthy());
        assert!(HealthStatus::Unhealthy("dead".to_owned()).is_unhealthy());
    }

    #[test]
    fn health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(
            HealthStatus::Degraded("docker slow".to_owned()).to_string(),
            "degraded: docker slow"
        );
        assert_eq!(
            HealthStatus::Unhealthy("stopped".to_owned()).to_string(),
            "unhealthy: stopped"
        );
    }
}
