//! Error types for Harbor
//!
//! 모든 에러를 중앙에서 관리

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// 플러그인 코드가 던진 원본 에러
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ============================================================================
// ValidationError - 필드 단위 검증 실패
// ============================================================================

/// 단일 필드 위반
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// 필드 경로 (예: "pluginDirs[0]")
    pub field: String,

    /// 위반 메시지 (예: "must be at least 1 character")
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// 스키마 검증 실패 - 위반 목록을 순서대로 보존
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn new(violations: Vec<FieldViolation>) -> Self {
        Self { violations }
    }

    /// 단일 위반으로 생성
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![FieldViolation::new(field, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// 특정 필드의 위반 메시지
    pub fn messages_for(&self, field: &str) -> Vec<&str> {
        self.violations
            .iter()
            .filter(|v| v.field == field)
            .map(|v| v.message.as_str())
            .collect()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.violations.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", rendered.join("; "))
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// Error
// ============================================================================

/// Harbor 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 매니페스트 / 모듈 관련
    // ========================================================================
    #[error("Manifest parse error: {path} - {message}")]
    ManifestParse { path: String, message: String },

    #[error("Manifest validation error: {path} - {message}")]
    ManifestValidation { path: String, message: String },

    #[error("Module load error: {plugin_id} - {message}")]
    ModuleLoad { plugin_id: String, message: String },

    #[error("Plugin init failed: {plugin_id} - {message}")]
    PluginInit { plugin_id: String, message: String },

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Invalid transition for {plugin_id}: {from} -> {to}")]
    InvalidTransition {
        plugin_id: String,
        from: String,
        to: String,
    },

    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Validation failed: {0}")]
    Validation(ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 서비스 관련
    // ========================================================================
    #[error("Service conflict: {service}@{version} is owned by {owner}")]
    ServiceConflict {
        service: String,
        version: String,
        owner: String,
    },

    #[error("Service not found: {service}@{version}")]
    ServiceNotFound { service: String, version: String },

    #[error("Method not found: {service}@{version}.{method}")]
    MethodNotFound {
        service: String,
        version: String,
        method: String,
    },

    #[error("Permission denied: {caller} lacks {permission}")]
    PermissionDenied { caller: String, permission: String },

    #[error("Service invocation failed: {service}.{method} - {source}")]
    ServiceInvocation {
        service: String,
        method: String,
        #[source]
        source: BoxError,
    },

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// UI/이벤트 페이로드용 안정적인 에러 종류 문자열
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ManifestParse { .. } => "manifest_parse",
            Error::ManifestValidation { .. } => "manifest_validation",
            Error::ModuleLoad { .. } => "module_load",
            Error::PluginInit { .. } => "plugin_init",
            Error::PluginNotFound(_) => "plugin_not_found",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::Validation(_) => "validation",
            Error::Config(_) => "config",
            Error::ServiceConflict { .. } => "service_conflict",
            Error::ServiceNotFound { .. } => "service_not_found",
            Error::MethodNotFound { .. } => "method_not_found",
            Error::PermissionDenied { .. } => "permission_denied",
            Error::ServiceInvocation { .. } => "service_invocation",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Internal(_) => "internal",
        }
    }

    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::PermissionDenied { .. }
                | Error::PluginNotFound(_)
                | Error::ServiceNotFound { .. }
                | Error::MethodNotFound { .. }
                | Error::PluginInit { .. }
        )
    }

    /// 검증 에러라면 위반 목록 반환
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Error::Validation(v) => Some(v),
            _ => None,
        }
    }

    /// 매니페스트 파싱 에러 생성 헬퍼
    pub fn manifest_parse(path: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Error::ManifestParse {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// 매니페스트 검증 에러 생성 헬퍼
    pub fn manifest_validation(path: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Error::ManifestValidation {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// 서비스 호출 에러 생성 헬퍼 (원본 에러 보존)
    pub fn service_invocation(
        service: impl Into<String>,
        method: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::ServiceInvocation {
            service: service.into(),
            method: method.into(),
            source: source.into(),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
