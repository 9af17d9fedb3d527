//! 컨테이너 레지스트리 -- 추적 중인 컨테이너의 마지막 관측 상태
//!
//! [`Registry`]는 reconciler가 단독으로 소유하는 유일한 가변 상태입니다.
//! 이벤트가 단일 태스크에서 순차 처리되므로 잠금 없는 `HashMap`으로
//! 충분합니다.

use std::collections::HashMap;

use lastwords_core::types::LifecycleAction;
use tracing::warn;

/// 레지스트리 최대 레코드 수. 무제한 메모리 증가 방지.
const MAX_TRACKED_CONTAINERS: usize = 10_000;

/// 추적 중인 컨테이너 한 건의 레코드
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    /// 컨테이너 ID (이벤트 actor ID와 동일한 전체 ID)
    pub id: String,
    /// 컨테이너 이름 (선행 `/` 제거됨)
    pub name: String,
    /// 이미지 이름
    pub image: String,
    /// 재시작 정책 이름
    pub restart_policy: String,
    /// 관측 기반 재시작 횟수 추정치
    ///
    /// 이벤트 조회 사이에 여러 사이클이 지나가면 실제보다 적게
    /// 셀 수 있습니다. 정확한 카운터가 아니라 알림 문구용 추정치입니다.
    pub restart_count: u64,
    /// 마지막으로 관측된 생명주기 액션
    pub last_action: LifecycleAction,
}

/// 추적 컨테이너 레지스트리
#[derive(Debug, Default)]
pub struct Registry {
    records: HashMap<String, ContainerRecord>,
}

impl Registry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// ID로 레코드를 조회합니다.
    pub fn get(&self, id: &str) -> Option<&ContainerRecord> {
        self.records.get(id)
    }

    /// ID로 레코드를 가변 조회합니다.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut ContainerRecord> {
        self.records.get_mut(id)
    }

    /// 레코드를 삽입하거나 갱신합니다.
    ///
    /// 새 ID인데 레지스트리가 상한에 도달한 경우 삽입을 거부하고
    /// false를 반환합니다. 기존 ID 갱신은 상한과 무관하게 허용됩니다.
    pub fn insert(&mut self, record: ContainerRecord) -> bool {
        if !self.records.contains_key(&record.id) && self.records.len() >= MAX_TRACKED_CONTAINERS {
            warn!(
                capacity = MAX_TRACKED_CONTAINERS,
                container_id = %record.id,
                "registry at capacity, refusing to track container"
            );
            return false;
        }
        self.records.insert(record.id.clone(), record);
        true
    }

    /// 레코드를 제거하고 반환합니다.
    pub fn remove(&mut self, id: &str) -> Option<ContainerRecord> {
        self.records.remove(id)
    }

    /// ID 추적 여부를 확인합니다.
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// 추적 중인 레코드 수
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 레지스트리가 비었는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
