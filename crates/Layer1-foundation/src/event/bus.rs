//! Event Bus - 토픽 기반 발행/구독 시스템
//!
//! 구독 순서대로 핸들러를 동기 호출합니다. 핸들러가 시작한 비동기 작업은
//! 기다리지 않으며, 한 핸들러의 실패가 나머지 핸들러 실행을 막지 않습니다.

use super::types::Event;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, trace, warn};

// ============================================================================
// EventHandler Trait
// ============================================================================

/// 이벤트 핸들러 trait
///
/// 핸들러 동일성은 `Arc` 포인터로 판단합니다. 같은 `Arc`를 두 번 구독해도
/// 한 번만 등록됩니다.
pub trait EventHandler: Send + Sync {
    /// 핸들러 이름 (디버깅용)
    fn name(&self) -> &str {
        "handler"
    }

    /// 이벤트 처리
    fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

/// 클로저 기반 핸들러
struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &Event) -> anyhow::Result<()> {
        (self.f)(event)
    }
}

/// 클로저를 핸들러로 변환
pub fn handler_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn EventHandler>
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}

fn same_handler(a: &Arc<dyn EventHandler>, b: &Arc<dyn EventHandler>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

// ============================================================================
// EventBus
// ============================================================================

/// 이벤트 버스 설정
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// 브로드캐스트 채널 용량 (관찰자 스트림용)
    pub channel_capacity: usize,

    /// 디버그 모드 (모든 이벤트 로깅)
    pub debug_mode: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            debug_mode: false,
        }
    }
}

/// 이벤트 버스
///
/// 전역 싱글톤이 아니라 명시적으로 생성해 `Arc`로 주입합니다.
/// 재시작하면 상태가 사라지며, 늦게 구독한 핸들러에게 과거 이벤트를
/// 재전달하지 않습니다.
///
/// ## 사용법
///
/// ```ignore
/// let bus = Arc::new(EventBus::new());
/// let handler = handler_fn("printer", |e| { println!("{}", e.topic); Ok(()) });
///
/// bus.subscribe("build:done", handler.clone());
/// bus.publish("build:done", json!({ "ok": true }));
/// bus.unsubscribe("build:done", &handler);
/// ```
pub struct EventBus {
    /// 설정
    config: EventBusConfig,

    /// 토픽별 구독자 (구독 순서 유지)
    subscribers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,

    /// 관찰자 스트림
    sender: broadcast::Sender<Event>,

    /// 발행된 이벤트 수
    event_count: AtomicU64,
}

impl EventBus {
    /// 기본 설정으로 이벤트 버스 생성
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// 커스텀 설정으로 이벤트 버스 생성
    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));

        Self {
            config,
            subscribers: RwLock::new(HashMap::new()),
            sender,
            event_count: AtomicU64::new(0),
        }
    }

    /// 핸들러 구독
    ///
    /// 이미 같은 토픽에 같은 핸들러가 있으면 아무것도 하지 않고 `false`를 반환합니다.
    pub fn subscribe(&self, topic: impl Into<String>, handler: Arc<dyn EventHandler>) -> bool {
        let topic = topic.into();
        let mut subscribers = self.subscribers.write();
        let list = subscribers.entry(topic.clone()).or_default();

        if list.iter().any(|h| same_handler(h, &handler)) {
            trace!(topic = %topic, handler = handler.name(), "Handler already subscribed");
            return false;
        }

        debug!(topic = %topic, handler = handler.name(), "Subscribing handler");
        list.push(handler);
        true
    }

    /// 핸들러 구독 해제
    ///
    /// 등록되지 않은 핸들러면 `false`를 반환하며 다른 구독자에게 영향이 없습니다.
    pub fn unsubscribe(&self, topic: &str, handler: &Arc<dyn EventHandler>) -> bool {
        let mut subscribers = self.subscribers.write();
        let Some(list) = subscribers.get_mut(topic) else {
            return false;
        };

        let before = list.len();
        list.retain(|h| !same_handler(h, handler));
        let removed = list.len() != before;

        if list.is_empty() {
            subscribers.remove(topic);
        }

        if removed {
            debug!(topic = %topic, handler = handler.name(), "Unsubscribed handler");
        }

        removed
    }

    /// 이벤트 발행
    pub fn publish(&self, topic: impl Into<String>, payload: serde_json::Value) {
        self.publish_event(Event::new(topic, payload));
    }

    /// 이미 만들어진 이벤트 발행
    ///
    /// 현재 구독자 목록의 스냅샷을 구독 순서대로 호출한 뒤 반환합니다.
    /// 핸들러 안에서의 구독/해제/발행은 다음 발행부터 반영됩니다.
    pub fn publish_event(&self, event: Event) {
        let count = self.event_count.fetch_add(1, Ordering::SeqCst) + 1;

        if self.config.debug_mode {
            trace!(event_id = %event.id, topic = %event.topic, "Publishing event #{}", count);
        }

        let handlers: Vec<Arc<dyn EventHandler>> = self
            .subscribers
            .read()
            .get(&event.topic)
            .cloned()
            .unwrap_or_default();

        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler.handle(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        topic = %event.topic,
                        handler = handler.name(),
                        "Event handler failed: {}", e
                    );
                }
                Err(_) => {
                    error!(
                        topic = %event.topic,
                        handler = handler.name(),
                        "Event handler panicked"
                    );
                }
            }
        }

        // 관찰자가 없어도 OK
        let _ = self.sender.send(event);
    }

    /// 모든 이벤트를 받는 관찰자 스트림 (UI/모니터링용)
    pub fn receiver(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// 토픽의 구독자 수
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers.read().get(topic).map_or(0, |l| l.len())
    }

    /// 구독자가 있는 토픽 목록 (정렬됨)
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.subscribers.read().keys().cloned().collect();
        topics.sort();
        topics
    }

    /// 총 발행된 이벤트 수
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// 테스트
// ============================================================================
