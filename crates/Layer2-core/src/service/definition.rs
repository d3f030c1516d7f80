//! Service Definition - `(serviceName, version, methodName) → 구현`

use async_trait::async_trait;
use harbor_foundation::service_permission;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

// ============================================================================
// ServiceMethod Trait
// ============================================================================

/// 서비스 메서드 구현
///
/// 플러그인 코드가 작성하므로 `anyhow::Result`를 반환합니다. 호스트는
/// 실패를 `ServiceInvocation` 에러로 감싸 원인을 보존합니다.
#[async_trait]
pub trait ServiceMethod: Send + Sync {
    async fn call(&self, params: Value) -> anyhow::Result<Value>;
}

struct FnMethod<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> ServiceMethod for FnMethod<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn call(&self, params: Value) -> anyhow::Result<Value> {
        (self.f)(params).await
    }
}

/// 비동기 클로저를 서비스 메서드로 변환
pub fn method_fn<F, Fut>(f: F) -> Arc<dyn ServiceMethod>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnMethod { f })
}

// ============================================================================
// ServiceDefinition
// ============================================================================

/// 서비스 정의 - 이름/버전 + 메서드 테이블
///
/// ```ignore
/// let greet = ServiceDefinition::new("greet", "1.0.0")
///     .method_fn("hello", |params| async move {
///         let name = params[0].as_str().unwrap_or("stranger").to_string();
///         Ok(json!(format!("Hello {}", name)))
///     });
/// ```
#[derive(Clone)]
pub struct ServiceDefinition {
    pub name: String,
    pub version: String,

    /// 호출에 필요한 권한 (기본값 `service:<name>`)
    pub required_permission: String,

    methods: BTreeMap<String, Arc<dyn ServiceMethod>>,
}

impl ServiceDefinition {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            required_permission: service_permission(&name),
            name,
            version: version.into(),
            methods: BTreeMap::new(),
        }
    }

    /// 빌더 패턴: 메서드 추가 (같은 이름이면 교체)
    pub fn method(mut self, name: impl Into<String>, method: Arc<dyn ServiceMethod>) -> Self {
        self.methods.insert(name.into(), method);
        self
    }

    /// 빌더 패턴: 클로저 메서드 추가
    pub fn method_fn<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.method(name, method_fn(f))
    }

    /// 빌더 패턴: 필요 권한 변경
    pub fn with_required_permission(mut self, permission: impl Into<String>) -> Self {
        self.required_permission = permission.into();
        self
    }

    pub fn get_method(&self, name: &str) -> Option<Arc<dyn ServiceMethod>> {
        self.methods.get(name).cloned()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// 메서드 이름 (정렬됨)
    pub fn method_names(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }

    /// 발견용 레코드
    pub fn info(&self, owner: &str) -> ServiceInfo {
        ServiceInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            owner: owner.to_string(),
            methods: self.method_names(),
            required_permission: self.required_permission.clone(),
        }
    }
}

impl std::fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("required_permission", &self.required_permission)
            .field("methods", &self.method_names())
            .finish()
    }
}

/// 서비스 발견 레코드 (UI/로그용, 구현 참조 없음)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub owner: String,
    pub methods: Vec<String>,
    pub required_permission: String,
}
