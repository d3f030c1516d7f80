//! # harbor-foundation
//!
//! Foundation layer for Harbor:
//! - Error: 에러 분류 (ValidationError, 서비스/플러그인 에러)
//! - Event: 토픽 기반 이벤트 버스 (동기 발행, 리플레이 없음)
//! - Permission: 매니페스트 권한 검증 (순수 함수)
//! - Settings: JSONC 설정 파일 + 선언적 스키마
//! - Config: 호스트 설정 / 플러그인 레지스트리 파일
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Plugin Manager (harbor-core)                           │
//! │          │                 │                │           │
//! │          ▼                 ▼                ▼           │
//! │     Settings Store     Event Bus     Service Registry   │
//! │     (schema 검증)      (pub/sub)           │            │
//! │                                            ▼            │
//! │                                  Permission Validator   │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod permission;
pub mod settings;

// ============================================================================
// Error
// ============================================================================
pub use error::{BoxError, Error, FieldViolation, Result, ValidationError};

// ============================================================================
// Event (이벤트 시스템)
// ============================================================================
pub use event::{handler_fn, topics, Event, EventBus, EventBusConfig, EventHandler, EventId};

// ============================================================================
// Permission (권한 검증)
// ============================================================================
pub use permission::{
    capabilities, has_permission, service_permission, validate as validate_permissions,
    DeclaresPermissions, PermissionCheck, PermissionSet,
};

// ============================================================================
// Settings (설정 저장소)
// ============================================================================
pub use settings::{
    parse_jsonc, strip_json_comments, ConfigSchema, Constraint, FieldKind, FieldSpec,
    SettingsStore,
};

// ============================================================================
// Config (설정 문서)
// ============================================================================
pub use config::{AppConfig, PluginRegistryFile, RegistryEntry, APP_CONFIG_FILE};
