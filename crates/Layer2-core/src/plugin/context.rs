//! Plugin Context - 플러그인이 호스트와 상호작용하는 인터페이스
//!
//! 플러그인에게는 좁은 기능만 전달합니다:
//! - `logger`: tracing 전달 (target `harbor::plugin`)
//! - `events`: 이벤트 버스 subscribe/unsubscribe/publish
//! - `services`: 서비스 발견/호출
//! - `config`: 검증된 설정 (매니저가 갱신)
//!
//! 다른 플러그인의 init/stop이나 레지스트리 맵에 접근할 방법은 없습니다.

use crate::service::ServiceRegistryHandle;
use harbor_foundation::{EventBus, EventHandler};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

// ============================================================================
// RuntimeError - 플러그인이 보고한 런타임 오류
// ============================================================================

/// 플러그인이 컨텍스트를 통해 보고한 오류 (매니저가 다음 작업 시작 시 반영)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub plugin_id: String,
    /// 보고한 컨텍스트의 로드 세대. 현재 인스턴스와 다르면 무시됨
    pub generation: u64,
    pub message: String,
}

// ============================================================================
// PluginLogger
// ============================================================================

/// 플러그인용 로거
#[derive(Debug, Clone)]
pub struct PluginLogger {
    plugin_id: String,
}

impl PluginLogger {
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
        }
    }

    pub fn debug(&self, message: impl std::fmt::Display) {
        tracing::debug!(target: "harbor::plugin", plugin_id = %self.plugin_id, "{}", message);
    }

    pub fn info(&self, message: impl std::fmt::Display) {
        tracing::info!(target: "harbor::plugin", plugin_id = %self.plugin_id, "{}", message);
    }

    pub fn warn(&self, message: impl std::fmt::Display) {
        tracing::warn!(target: "harbor::plugin", plugin_id = %self.plugin_id, "{}", message);
    }

    pub fn error(&self, message: impl std::fmt::Display) {
        tracing::error!(target: "harbor::plugin", plugin_id = %self.plugin_id, "{}", message);
    }
}

// ============================================================================
// EventBusHandle
// ============================================================================

/// 플러그인용 이벤트 버스 핸들
///
/// 구독 목록을 기억해 두었다가 플러그인이 중지되면 매니저가 한 번에 해제합니다.
/// 해제된 핸들로는 더 이상 구독할 수 없습니다.
#[derive(Clone)]
pub struct EventBusHandle {
    bus: Arc<EventBus>,
    subscriptions: Arc<Mutex<Vec<(String, Arc<dyn EventHandler>)>>>,
    released: Arc<AtomicBool>,
}

impl EventBusHandle {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self, topic: impl Into<String>, handler: Arc<dyn EventHandler>) -> bool {
        let topic = topic.into();
        // 잠금 안에서 확인해야 unsubscribe_all과 경합하지 않음
        let mut subscriptions = self.subscriptions.lock();
        if self.is_released() {
            tracing::debug!(topic = %topic, "Ignoring subscribe on released handle");
            return false;
        }
        let added = self.bus.subscribe(topic.clone(), Arc::clone(&handler));
        if added {
            subscriptions.push((topic, handler));
        }
        added
    }

    pub fn unsubscribe(&self, topic: &str, handler: &Arc<dyn EventHandler>) -> bool {
        let removed = self.bus.unsubscribe(topic, handler);
        if removed {
            self.subscriptions.lock().retain(|(t, h)| {
                !(t == topic
                    && std::ptr::eq(Arc::as_ptr(h) as *const (), Arc::as_ptr(handler) as *const ()))
            });
        }
        removed
    }

    pub fn publish(&self, topic: impl Into<String>, payload: Value) {
        self.bus.publish(topic, payload);
    }

    /// 현재 유지 중인 구독 수
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// 플러그인 인스턴스가 중지되어 핸들이 해제되었는지
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// 이 핸들로 만든 모든 구독 해제 + 이후 구독 차단
    pub(crate) fn unsubscribe_all(&self) -> usize {
        let subscriptions = {
            let mut guard = self.subscriptions.lock();
            self.released.store(true, Ordering::SeqCst);
            std::mem::take(&mut *guard)
        };
        let count = subscriptions.len();
        for (topic, handler) in subscriptions {
            self.bus.unsubscribe(&topic, &handler);
        }
        count
    }
}

// ============================================================================
// PluginContext
// ============================================================================

/// 플러그인 컨텍스트 - `init(ctx)`에 전달
///
/// `Clone`이 싸므로 백그라운드 작업에 복사해 넘겨도 됩니다.
#[derive(Clone)]
pub struct PluginContext {
    plugin_id: String,

    /// 이 컨텍스트를 만든 로드의 세대 번호
    generation: u64,

    /// 매니페스트 선언 권한 (호출별 부여 결과가 아님)
    permissions: Arc<Vec<String>>,

    /// 검증된 설정 (매니저와 공유)
    config: Arc<RwLock<Value>>,

    logger: PluginLogger,
    events: EventBusHandle,
    services: ServiceRegistryHandle,
    errors: mpsc::UnboundedSender<RuntimeError>,
}

impl PluginContext {
    pub(crate) fn new(
        plugin_id: impl Into<String>,
        generation: u64,
        permissions: Vec<String>,
        config: Arc<RwLock<Value>>,
        events: EventBusHandle,
        services: ServiceRegistryHandle,
        errors: mpsc::UnboundedSender<RuntimeError>,
    ) -> Self {
        let plugin_id = plugin_id.into();
        Self {
            logger: PluginLogger::new(plugin_id.clone()),
            plugin_id,
            generation,
            permissions: Arc::new(permissions),
            config,
            events,
            services,
            errors,
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    /// 현재 설정 스냅샷
    pub fn config(&self) -> Value {
        self.config.read().clone()
    }

    /// 설정 값 하나
    pub fn config_value(&self, key: &str) -> Option<Value> {
        self.config.read().get(key).cloned()
    }

    pub fn logger(&self) -> &PluginLogger {
        &self.logger
    }

    pub fn events(&self) -> &EventBusHandle {
        &self.events
    }

    pub fn services(&self) -> &ServiceRegistryHandle {
        &self.services
    }

    /// 런타임 오류 보고 → ACTIVE 플러그인은 ERROR로 전이
    ///
    /// 이미 중지된 인스턴스의 컨텍스트에서 보낸 오류는 매니저가 버립니다.
    pub fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.logger.error(&message);
        // 매니저가 이미 종료되었으면 무시
        let _ = self.errors.send(RuntimeError {
            plugin_id: self.plugin_id.clone(),
            generation: self.generation,
            message,
        });
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_id", &self.plugin_id)
            .field("generation", &self.generation)
            .field("permissions", &self.permissions)
            .finish()
    }
}
