//! # Plugin System
//!
//! 플러그인 발견, 라이프사이클, 컨텍스트
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PluginManager                           │
//! │  PluginDiscovery ──▶ plugin.json ──▶ PluginManifest          │
//! │         │                                                   │
//! │         ▼                                                   │
//! │  ModuleLoader ──▶ LoadedModule ──init(ctx)──▶ ACTIVE         │
//! │                                   │                         │
//! │  ┌────────────────────────────────┼───────────────────────┐ │
//! │  │     PluginContext              │                       │ │
//! │  │  - logger   (tracing)          │                       │ │
//! │  │  - events   (EventBusHandle)   │                       │ │
//! │  │  - services (ServiceRegistryHandle)                    │ │
//! │  │  - config   (검증된 설정)                               │ │
//! │  └────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 예시
//!
//! ```ignore
//! struct Greeter;
//!
//! #[async_trait]
//! impl PluginModule for Greeter {
//!     async fn init(&self, ctx: PluginContext) -> anyhow::Result<()> {
//!         ctx.logger().info("ready");
//!         Ok(())
//!     }
//! }
//!
//! let loader = NativeModuleLoader::new()
//!     .with_module("greeter", |_| Ok(Arc::new(Greeter)));
//! let manager = PluginManager::new(PluginManagerConfig::with_root("."), Arc::new(loader));
//! manager.load_all().await?;
//! ```

mod context;
mod discovery;
mod manager;
mod manifest;
mod module;
mod status;

pub use context::{EventBusHandle, PluginContext, PluginLogger, RuntimeError};
pub use discovery::{DiscoveredPlugin, DiscoveryReport, PluginDiscovery, SkippedPlugin, MANIFEST_FILE};
pub use manager::{PluginManager, PluginManagerConfig, PluginSnapshot};
pub use manifest::{PluginKind, PluginManifest};
pub use module::{LoadedModule, ModuleExports, ModuleLoader, NativeModuleLoader, PluginModule};
pub use status::PluginStatus;
