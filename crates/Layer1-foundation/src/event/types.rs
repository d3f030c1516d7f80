//! Event Types - 토픽 기반 이벤트 정의

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Event ID
// ============================================================================

/// 이벤트 고유 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    /// 새 이벤트 ID 생성
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Event
// ============================================================================

/// 이벤트 - `(topic, payload)` 쌍
///
/// 페이로드는 `serde_json::Value`이므로 함수/순환 참조를 담을 수 없고,
/// 프로세스 경계를 넘어 직렬화해도 안전합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// 이벤트 ID
    pub id: EventId,

    /// 토픽 (자유 형식 문자열, 정확히 일치하는 구독자에게만 전달)
    pub topic: String,

    /// 페이로드
    pub payload: Value,

    /// 발행 시각
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// 새 이벤트 생성
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            id: EventId::new(),
            topic: topic.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// 페이로드 없는 이벤트
    pub fn simple(topic: impl Into<String>) -> Self {
        Self::new(topic, Value::Null)
    }
}

// ============================================================================
// 사전 정의된 토픽
// ============================================================================

/// 호스트가 발행하는 토픽 이름
pub mod topics {
    /// 서비스 호출 성공 후 발행
    pub const SERVICE_CALLED: &str = "service:called";

    pub fn plugin_loaded(id: &str) -> String {
        format!("plugin:{}-loaded", id)
    }

    pub fn plugin_error(id: &str) -> String {
        format!("plugin:{}-error", id)
    }

    pub fn plugin_stopped(id: &str) -> String {
        format!("plugin:{}-stopped", id)
    }

    pub fn plugin_unloaded(id: &str) -> String {
        format!("plugin:{}-unloaded", id)
    }

    pub fn plugin_config_updated(id: &str) -> String {
        format!("plugin:{}-config-updated", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_topics() {
        assert_eq!(topics::plugin_stopped("git"), "plugin:git-stopped");
        assert_eq!(topics::plugin_unloaded("git"), "plugin:git-unloaded");
        assert_eq!(
            topics::plugin_config_updated("git"),
            "plugin:git-config-updated"
        );
    }

    #[test]
    fn test_event_serializes() {
        let event = Event::new("custom:topic", serde_json::json!({ "n": 1 }));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["topic"], "custom:topic");
        assert_eq!(json["payload"]["n"], 1);
    }
}
