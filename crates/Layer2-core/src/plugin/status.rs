//! Plugin lifecycle 상태

use serde::{Deserialize, Serialize};

/// 플러그인 상태
///
/// ```text
/// DISCOVERED ──load──▶ LOADING ──init ok──▶ ACTIVE ──stop──▶ INACTIVE
///      │                  │                   │                 │
///      │             load/init 실패        runtime error        │
///      ▼                  ▼                   ▼                 │
///    ERROR ◀──────────────┴───────────────────┘                 │
///      │                                                        │
///      └──────────── reload ──▶ DISCOVERED ◀──── reload ────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginStatus {
    /// 매니페스트 발견됨 (로드 전)
    Discovered,

    /// 모듈 로드 + init 진행 중
    Loading,

    /// 활성화됨
    Active,

    /// 중지됨 (비활성화/언로드)
    Inactive,

    /// 오류 상태
    Error,
}

impl PluginStatus {
    /// 허용된 전이인지 확인
    pub fn can_transition_to(&self, next: PluginStatus) -> bool {
        use PluginStatus::*;

        matches!(
            (self, next),
            (Discovered, Loading)
                | (Discovered, Error)
                | (Discovered, Inactive)
                | (Loading, Active)
                | (Loading, Error)
                | (Active, Inactive)
                | (Active, Error)
                | (Inactive, Discovered)
                | (Error, Discovered)
        )
    }

    /// reload로만 벗어날 수 있는 안정 상태
    pub fn is_stable(&self) -> bool {
        matches!(self, Self::Inactive | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "DISCOVERED",
            Self::Loading => "LOADING",
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PluginStatus::*;

    #[test]
    fn test_lifecycle_transitions() {
        assert!(Discovered.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Active));
        assert!(Active.can_transition_to(Inactive));
        assert!(Active.can_transition_to(Error));
        assert!(Inactive.can_transition_to(Discovered));
        assert!(Error.can_transition_to(Discovered));
    }

    #[test]
    fn test_no_automatic_retry() {
        // ERROR/INACTIVE는 reload(→ DISCOVERED)를 거쳐야만 다시 로드
        assert!(!Error.can_transition_to(Loading));
        assert!(!Error.can_transition_to(Active));
        assert!(!Inactive.can_transition_to(Active));
        assert!(!Active.can_transition_to(Discovered));
        assert!(Error.is_stable() && Inactive.is_stable());
    }

    #[test]
    fn test_serialized_form() {
        assert_eq!(serde_json::to_string(&Active).unwrap(), "\"ACTIVE\"");
        assert_eq!(Inactive.to_string(), "INACTIVE");
    }
}
