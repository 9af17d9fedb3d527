//! 재시작 정책 평가 -- crash-loop 추적 대상 판별
//!
//! Docker 재시작 정책 이름만 보고 해당 컨테이너를 추적할지 결정하는
//! 순수 함수입니다. 런타임이 재시작해주지 않는 컨테이너(`no`, 빈 값)는
//! crash 후에 start 이벤트가 다시 오지 않으므로 crash-loop 자체가
//! 성립하지 않습니다.

/// 재시작 정책이 crash-loop 추적 대상인지 판별합니다.
///
/// - `always`, `unless-stopped`: 정확히 일치할 때만 true
/// - `on-failure` 접두사: `on-failure`, `on-failure:5` 등 모두 true
/// - 그 외 (`no`, 빈 문자열, 알 수 없는 값): false
///
/// 알 수 없는 정책 이름은 추적하지 않는 쪽으로 처리합니다.
pub fn is_trackable(policy: &str) -> bool {
    policy == "always" || policy == "unless-stopped" || policy.starts_with("on-failure")
}
