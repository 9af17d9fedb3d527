//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! watcher와 daemon이 공유하는 컨테이너 데이터 구조를 정의합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 컨테이너 요약 정보
///
/// 실행 중 컨테이너 목록 조회 결과의 한 건을 나타냅니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSummary {
    /// 컨테이너 ID
    pub id: String,
    /// 컨테이너 이름 (선행 `/` 제거)
    pub name: String,
    /// 이미지명
    pub image: String,
    /// 상태 문자열 (running, restarting 등)
    pub state: String,
}

impl fmt::Display for ContainerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) image={} state={}",
            self.name,
            &self.id[..12.min(self.id.len())],
            self.image,
            self.state,
        )
    }
}

/// 컨테이너 상세 정보
///
/// inspect 호출 결과 중 crash-loop 추적에 필요한 필드만 담습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerDetails {
    /// 컨테이너 ID
    pub id: String,
    /// 컨테이너 이름 (선행 `/` 제거)
    pub name: String,
    /// 이미지명
    pub image: String,
    /// 재시작 정책 이름 (no, always, unless-stopped, on-failure[:N])
    pub restart_policy: String,
    /// 런타임이 기록한 재시작 횟수
    pub restart_count: u64,
    /// 상태 문자열 (running, restarting, exited 등)
    pub state: String,
}

impl fmt::Display for ContainerDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) image={} policy={} restarts={}",
            self.name,
            &self.id[..12.min(self.id.len())],
            self.image,
            self.restart_policy,
            self.restart_count,
        )
    }
}

/// 컨테이너 생명주기 액션
///
/// Docker 이벤트 스트림의 action 필드 중 모니터링 대상만 열거합니다.
/// 이 목록에 없는 액션은 이벤트 구독 단계에서 걸러집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleAction {
    /// 컨테이너 시작
    Start,
    /// 컨테이너 종료 (정상/비정상 모두)
    Die,
    /// 런타임 재시작 요청
    Restart,
    /// 강제 종료 시그널
    Kill,
    /// OOM killer에 의한 종료
    Oom,
    /// 일시 정지
    Pause,
    /// 일시 정지 해제
    Unpause,
    /// 컨테이너 제거
    Destroy,
}

impl LifecycleAction {
    /// 문자열에서 액션을 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다. 목록에 없는 액션은 `None`을 반환합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "die" => Some(Self::Die),
            "restart" => Some(Self::Restart),
            "kill" => Some(Self::Kill),
            "oom" => Some(Self::Oom),
            "pause" => Some(Self::Pause),
            "unpause" => Some(Self::Unpause),
            "destroy" => Some(Self::Destroy),
            _ => None,
        }
    }

    /// Docker 이벤트 스트림이 쓰는 소문자 표기를 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Die => "die",
            Self::Restart => "restart",
            Self::Kill => "kill",
            Self::Oom => "oom",
            Self::Pause => "pause",
            Self::Unpause => "unpause",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_summary_display_truncates_id() {
        let summary = ContainerSummary {
            id: "abc123def456789012345678".to_owned(),
            name: "web-server".to_owned(),
            image: "nginx:latest".to_owned(),
            state: "running".to_owned(),
        };
        let display = summary.to_string();
        assert!(display.contains("web-server"));
        assert!(display.contains("abc123def456"));
        assert!(!display.contains("abc123def4567"));
    }

    #[test]
    fn container_summary_display_short_id() {
        let summary = ContainerSummary {
            id: "ab12".to_owned(),
            name: "tiny".to_owned(),
            image: "alpine".to_owned(),
            state: "running".to_owned(),
        };
        // 12자 미만 ID도 패닉 없이 표시
        assert!(summary.to_string().contains("ab12"));
    }

    #[test]
    fn container_details_display() {
        let details = ContainerDetails {
            id: "deadbeef0000cafe".to_owned(),
            name: "api".to_owned(),
            image: "api:1.2".to_owned(),
            restart_policy: "always".to_owned(),
            restart_count: 3,
            state: "running".to_owned(),
        };
        let display = details.to_string();
        assert!(display.contains("api"));
        assert!(display.contains("policy=always"));
        assert!(display.contains("restarts=3"));
    }

    #[test]
    fn lifecycle_action_from_str_loose() {
        assert_eq!(
            LifecycleAction::from_str_loose("start"),
            Some(LifecycleAction::Start)
        );
        assert_eq!(
            LifecycleAction::from_str_loose("Die"),
            Some(LifecycleAction::Die)
        );
        assert_eq!(
            LifecycleAction::from_str_loose("OOM"),
            Some(LifecycleAction::Oom)
        );
        assert_eq!(
            LifecycleAction::from_str_loose("destroy"),
            Some(LifecycleAction::Destroy)
        );
        assert_eq!(LifecycleAction::from_str_loose("exec_create"), None);
        assert_eq!(LifecycleAction::from_str_loose(""), None);
    }

    #[test]
    fn lifecycle_action_as_str_roundtrip() {
        let actions = [
            LifecycleAction::Start,
            LifecycleAction::Die,
            LifecycleAction::Restart,
            LifecycleAction::Kill,
            LifecycleAction::Oom,
            LifecycleAction::Pause,
            LifecycleAction::Unpause,
            LifecycleAction::Destroy,
        ];
        for action in actions {
            assert_eq!(LifecycleAction::from_str_loose(action.as_str()), Some(action));
        }
    }

    #[test]
    fn lifecycle_action_display() {
        assert_eq!(LifecycleAction::Start.to_string(), "start");
        assert_eq!(LifecycleAction::Die.to_string(), "die");
        assert_eq!(LifecycleAction::Oom.to_string(), "oom");
    }

    #[test]
    fn lifecycle_action_serialize_lowercase() {
        let json = serde_json::to_string(&LifecycleAction::Die).unwrap();
        assert_eq!(json, "\"die\"");
        let deserialized: LifecycleAction = serde_json::from_str("\"unpause\"").unwrap();
        assert_eq!(deserialized, LifecycleAction::Unpause);
    }

    #[test]
    fn container_summary_serialize_roundtrip() {
        let summary = ContainerSummary {
            id: "0123456789abcdef".to_owned(),
            name: "db".to_owned(),
            image: "postgres:16".to_owned(),
            state: "running".to_owned(),
        };
        let json = serde_json::to_string(&summary).unwrap();
        let deserialized: ContainerSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(summary.id, deserialized.id);
        assert_eq!(summary.image, deserialized.image);
    }
}
