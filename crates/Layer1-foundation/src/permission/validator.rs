//! Permission Validator - 선언된 권한과 요청 권한 비교
//!
//! 순수 함수만 제공합니다. 가변 레지스트리 상태를 참조하지 않으며
//! 전달받은 선언 목록만으로 결정하므로 항상 결정적입니다.

use serde::{Deserialize, Serialize};

/// 권한을 선언하는 주체 (플러그인 매니페스트 등)
pub trait DeclaresPermissions {
    /// 선언 주체 ID (로깅용)
    fn holder_id(&self) -> &str;

    /// 선언된 권한 목록. 필드가 없으면 빈 목록
    fn declared_permissions(&self) -> &[String];
}

/// 단순 권한 집합 - 매니페스트 없이 검증할 때 사용
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    pub holder: String,
    pub permissions: Vec<String>,
}

impl PermissionSet {
    pub fn new(holder: impl Into<String>, permissions: Vec<String>) -> Self {
        Self {
            holder: holder.into(),
            permissions,
        }
    }
}

impl DeclaresPermissions for PermissionSet {
    fn holder_id(&self) -> &str {
        &self.holder
    }

    fn declared_permissions(&self) -> &[String] {
        &self.permissions
    }
}

/// 검증 결과 - 요청 순서를 그대로 유지
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCheck {
    pub allowed: Vec<String>,
    pub denied: Vec<String>,
}

impl PermissionCheck {
    /// 요청이 모두 허용되었는지
    pub fn is_fully_granted(&self) -> bool {
        self.denied.is_empty()
    }
}

/// 요청 권한을 허용/거부로 분류
///
/// 요청 항목이 선언 목록에 정확히 같은 문자열로 있을 때만 허용합니다.
/// 와일드카드/접두사 매칭은 없습니다. 중복 요청도 각각 분류되므로
/// `allowed.len() + denied.len() == requested.len()`이 항상 성립합니다.
pub fn validate<S, D>(requested: &[S], holder: &D) -> PermissionCheck
where
    S: AsRef<str>,
    D: DeclaresPermissions + ?Sized,
{
    let declared = holder.declared_permissions();
    let mut check = PermissionCheck::default();

    for permission in requested {
        let permission = permission.as_ref();
        if declared.iter().any(|d| d == permission) {
            check.allowed.push(permission.to_string());
        } else {
            check.denied.push(permission.to_string());
        }
    }

    check
}

/// 단일 권한 확인
pub fn has_permission<D>(plugin_id: &str, permission: &str, holder: &D) -> bool
where
    D: DeclaresPermissions + ?Sized,
{
    let granted = validate(&[permission], holder).is_fully_granted();
    if !granted {
        tracing::trace!(plugin_id = %plugin_id, permission = %permission, "Permission not declared");
    }
    granted
}
