//! Service Registry - 권한 검사되는 플러그인 간 메서드 호출
//!
//! - `(serviceName, version)`당 소유 플러그인은 하나
//! - 호출자 권한은 서버 측 매니페스트 권한과 교집합으로 계산 (호출마다 재계산)
//! - 락은 `.await` 동안 잡지 않으므로 서비스 메서드 안에서 다른 서비스를
//!   호출해도 교착되지 않음

use super::definition::{ServiceDefinition, ServiceInfo};
use harbor_foundation::{
    topics, validate_permissions, Error, EventBus, PermissionSet, Result,
};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// `(serviceName, version)`
type ServiceKey = (String, String);

struct ServiceEntry {
    owner: String,
    definition: ServiceDefinition,
}

/// 서비스 레지스트리
///
/// 서비스 맵과 호출자 권한 테이블은 이 타입만 변경합니다. 플러그인은
/// [`ServiceRegistryHandle`]만 받습니다.
pub struct ServiceRegistry {
    /// 서비스 저장소 (정렬된 발견 결과를 위해 BTreeMap)
    services: RwLock<BTreeMap<ServiceKey, ServiceEntry>>,

    /// 플러그인 ID → 매니페스트 선언 권한 (ACTIVE 플러그인만)
    callers: RwLock<HashMap<String, PermissionSet>>,

    /// `service:called` 발행용
    event_bus: Arc<EventBus>,
}

impl ServiceRegistry {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            services: RwLock::new(BTreeMap::new()),
            callers: RwLock::new(HashMap::new()),
            event_bus,
        }
    }

    // ========================================================================
    // 등록 / 해제
    // ========================================================================

    /// 서비스 등록
    ///
    /// 다른 플러그인이 이미 같은 `(name, version)`을 가졌으면 `ServiceConflict`,
    /// 같은 플러그인이면 교체합니다.
    pub fn register_service(&self, owner: &str, definition: ServiceDefinition) -> Result<()> {
        let key = (definition.name.clone(), definition.version.clone());
        let mut services = self.services.write();

        if let Some(existing) = services.get(&key) {
            if existing.owner != owner {
                warn!(
                    service = %key.0,
                    version = %key.1,
                    owner = %existing.owner,
                    "Rejected service registration from {}",
                    owner
                );
                return Err(Error::ServiceConflict {
                    service: key.0,
                    version: key.1,
                    owner: existing.owner.clone(),
                });
            }
            debug!(service = %key.0, version = %key.1, "Replacing service for {}", owner);
        } else {
            info!(service = %key.0, version = %key.1, "Registered service from {}", owner);
        }

        services.insert(
            key,
            ServiceEntry {
                owner: owner.to_string(),
                definition,
            },
        );
        Ok(())
    }

    /// 서비스 해제 - 소유자가 일치할 때만
    pub fn unregister_service(&self, owner: &str, name: &str, version: &str) -> bool {
        let key = (name.to_string(), version.to_string());
        let mut services = self.services.write();

        match services.get(&key) {
            Some(entry) if entry.owner == owner => {
                services.remove(&key);
                info!(service = %name, version = %version, "Unregistered service of {}", owner);
                true
            }
            Some(entry) => {
                warn!(
                    service = %name,
                    version = %version,
                    owner = %entry.owner,
                    "Ignored unregister request from {}",
                    owner
                );
                false
            }
            None => false,
        }
    }

    /// 플러그인이 소유한 모든 서비스 해제, 해제된 수 반환
    pub fn unregister_owner(&self, owner: &str) -> usize {
        let mut services = self.services.write();
        let before = services.len();
        services.retain(|_, entry| entry.owner != owner);
        let removed = before - services.len();
        if removed > 0 {
            debug!("Unregistered {} service(s) of {}", removed, owner);
        }
        removed
    }

    /// 플러그인이 소유한 서비스 목록
    pub fn services_of(&self, owner: &str) -> Vec<ServiceInfo> {
        self.services
            .read()
            .values()
            .filter(|e| e.owner == owner)
            .map(|e| e.definition.info(&e.owner))
            .collect()
    }

    /// 전체 서비스 목록 (권한 무시, 호스트 전용)
    pub fn all_services(&self) -> Vec<ServiceInfo> {
        self.services
            .read()
            .values()
            .map(|e| e.definition.info(&e.owner))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }

    // ========================================================================
    // 호출자 권한 테이블
    // ========================================================================

    /// 플러그인이 ACTIVE가 될 때 매니페스트 권한 등록
    pub fn set_caller_permissions(&self, plugin_id: &str, permissions: Vec<String>) {
        self.callers
            .write()
            .insert(plugin_id.to_string(), PermissionSet::new(plugin_id, permissions));
    }

    /// 플러그인이 ACTIVE를 벗어날 때 제거
    pub fn clear_caller(&self, plugin_id: &str) {
        self.callers.write().remove(plugin_id);
    }

    /// 저장된 매니페스트 권한 (모르는 호출자는 빈 목록)
    pub fn caller_permissions(&self, plugin_id: &str) -> Vec<String> {
        self.callers
            .read()
            .get(plugin_id)
            .map(|p| p.permissions.clone())
            .unwrap_or_default()
    }

    /// 호출자가 요청한 권한 중 매니페스트가 허용하는 것
    fn effective_grant<S: AsRef<str>>(&self, caller: &str, requested: &[S]) -> PermissionSet {
        let declared = self
            .callers
            .read()
            .get(caller)
            .cloned()
            .unwrap_or_else(|| PermissionSet::new(caller, Vec::new()));

        let check = validate_permissions(requested, &declared);
        if !check.denied.is_empty() {
            debug!(caller = %caller, denied = ?check.denied, "Ignoring undeclared caller permissions");
        }
        PermissionSet::new(caller, check.allowed)
    }

    // ========================================================================
    // 발견 / 호출
    // ========================================================================

    /// 호출자가 볼 수 있는 서비스 목록
    pub fn get_available_services<S: AsRef<str>>(
        &self,
        caller: &str,
        caller_permissions: &[S],
    ) -> Vec<ServiceInfo> {
        let grant = self.effective_grant(caller, caller_permissions);

        self.services
            .read()
            .values()
            .filter(|e| {
                validate_permissions(&[e.definition.required_permission.as_str()], &grant)
                    .is_fully_granted()
            })
            .map(|e| e.definition.info(&e.owner))
            .collect()
    }

    /// 서비스 메서드 호출
    ///
    /// 검사 순서: 서비스 존재 → 메서드 존재 → 권한 → 호출.
    /// 권한이 거부되면 대상 메서드는 실행되지 않습니다.
    pub async fn call_service<S: AsRef<str>>(
        &self,
        caller: &str,
        caller_permissions: &[S],
        service: &str,
        version: &str,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        // 락은 여기서만 잡고 await 전에 해제
        let (target, required, owner) = {
            let services = self.services.read();
            let entry = services
                .get(&(service.to_string(), version.to_string()))
                .ok_or_else(|| Error::ServiceNotFound {
                    service: service.to_string(),
                    version: version.to_string(),
                })?;

            let target = entry
                .definition
                .get_method(method)
                .ok_or_else(|| Error::MethodNotFound {
                    service: service.to_string(),
                    version: version.to_string(),
                    method: method.to_string(),
                })?;

            (
                target,
                entry.definition.required_permission.clone(),
                entry.owner.clone(),
            )
        };

        let grant = self.effective_grant(caller, caller_permissions);
        if !validate_permissions(&[required.as_str()], &grant).is_fully_granted() {
            warn!(
                caller = %caller,
                service = %service,
                method = %method,
                "Permission denied: missing {}",
                required
            );
            return Err(Error::PermissionDenied {
                caller: caller.to_string(),
                permission: required,
            });
        }

        debug!(caller = %caller, service = %service, method = %method, owner = %owner, "Calling service");

        let result = target
            .call(params)
            .await
            .map_err(|e| Error::service_invocation(service, method, e))?;

        self.event_bus.publish(
            topics::SERVICE_CALLED,
            json!({
                "caller": caller,
                "service": service,
                "version": version,
                "method": method,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }),
        );

        Ok(result)
    }

    /// 플러그인 전용 핸들 생성
    pub fn handle(self: &Arc<Self>, plugin_id: impl Into<String>) -> ServiceRegistryHandle {
        ServiceRegistryHandle {
            plugin_id: plugin_id.into(),
            registry: Arc::clone(self),
        }
    }
}

// ============================================================================
// ServiceRegistryHandle - 플러그인에게 주는 좁은 기능
// ============================================================================

/// 플러그인 ID에 묶인 레지스트리 핸들
///
/// 발견과 호출만 노출하며, 등록은 매니저가 모듈의 export를 연결할 때
/// 수행합니다.
#[derive(Clone)]
pub struct ServiceRegistryHandle {
    plugin_id: String,
    registry: Arc<ServiceRegistry>,
}

impl ServiceRegistryHandle {
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// 매니페스트 권한으로 볼 수 있는 서비스
    pub fn get_available_services(&self) -> Vec<ServiceInfo> {
        let permissions = self.registry.caller_permissions(&self.plugin_id);
        self.registry
            .get_available_services(&self.plugin_id, &permissions)
    }

    /// 매니페스트 권한으로 호출
    pub async fn call_service(
        &self,
        service: &str,
        version: &str,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        let permissions = self.registry.caller_permissions(&self.plugin_id);
        self.registry
            .call_service(&self.plugin_id, &permissions, service, version, method, params)
            .await
    }

    /// 권한 일부만 사용해 호출 (매니페스트에 없는 권한은 무시됨)
    pub async fn call_service_with<S: AsRef<str>>(
        &self,
        permissions: &[S],
        service: &str,
        version: &str,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        self.registry
            .call_service(&self.plugin_id, permissions, service, version, method, params)
            .await
    }
}

impl std::fmt::Debug for ServiceRegistryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistryHandle")
            .field("plugin_id", &self.plugin_id)
            .finish()
    }
}
