//! Event System - 토픽 기반 발행/구독 시스템
//!
//! 플러그인과 호스트 사이의 모든 비동기 알림이 이 버스를 지납니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        EventBus                              │
//! │  publish(topic, payload)                                     │
//! │         │                                                    │
//! │         ▼  (정확히 일치하는 토픽, 구독 순서대로)              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │  Handler 1   │  │  Handler 2   │  │  Handler N   │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! │         │                                                    │
//! │         ▼                                                    │
//! │  broadcast receiver (UI / 모니터링)                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 사용법
//!
//! ```ignore
//! use harbor_foundation::event::{EventBus, handler_fn, topics};
//!
//! let bus = Arc::new(EventBus::new());
//! bus.subscribe(topics::SERVICE_CALLED, handler_fn("audit", |event| {
//!     println!("{}", event.payload);
//!     Ok(())
//! }));
//! ```

pub mod bus;
pub mod types;

pub use bus::{handler_fn, EventBus, EventBusConfig, EventHandler};
pub use types::{topics, Event, EventId};
