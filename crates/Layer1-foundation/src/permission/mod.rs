//! Permission system for Harbor
//!
//! - `validator`: 매니페스트 선언 권한 대 요청 권한 분류 (순수 함수)
//! - `capabilities`: 표준 권한 문자열 상수
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use harbor_foundation::permission::{validate, capabilities};
//!
//! let check = validate(&[capabilities::FILESYSTEM_READ], &manifest);
//! if check.is_fully_granted() {
//!     // 실행
//! }
//! ```

mod validator;

pub use validator::{has_permission, validate, DeclaresPermissions, PermissionCheck, PermissionSet};

// ============================================================
// 표준 권한 문자열 (권장, 필수 아님)
// ============================================================

pub mod capabilities {
    pub const FILESYSTEM_READ: &str = "filesystem:read";
    pub const FILESYSTEM_WRITE: &str = "filesystem:write";
    pub const PROCESS_EXECUTE: &str = "process:execute";
    pub const NETWORK_HTTP: &str = "network:http";
    pub const NETWORK_HTTPS: &str = "network:https";
    pub const CLIPBOARD_READ: &str = "clipboard:read";
    pub const CLIPBOARD_WRITE: &str = "clipboard:write";

    /// 서비스 권한 접두사
    pub const SERVICE_PREFIX: &str = "service:";
}

/// 서비스 호출에 필요한 권한 (`service:<name>`)
pub fn service_permission(service_name: &str) -> String {
    format!("{}{}", capabilities::SERVICE_PREFIX, service_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_permission() {
        assert_eq!(service_permission("greet"), "service:greet");
    }
}
