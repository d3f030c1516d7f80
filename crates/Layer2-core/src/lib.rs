//! harbor-core: Plugin runtime for Harbor
//!
//! Layer2 - 플러그인 라이프사이클 + 서비스 레지스트리
//!
//! # 주요 모듈
//!
//! - `plugin`: 발견, 매니페스트, 모듈 로더, 컨텍스트, 매니저
//! - `service`: 플러그인 간 서비스 등록/발견/호출
//!
//! # 사용 예시
//!
//! ```ignore
//! use harbor_core::{NativeModuleLoader, PluginManager, PluginManagerConfig};
//!
//! let loader = NativeModuleLoader::new()
//!     .with_module("producer", |_| Ok(Arc::new(Producer)))
//!     .with_module("consumer", |_| Ok(Arc::new(Consumer)));
//!
//! let manager = PluginManager::new(PluginManagerConfig::with_root("."), Arc::new(loader));
//! for plugin in manager.load_all().await? {
//!     println!("{} {}", plugin.id, plugin.status);
//! }
//!
//! manager.update_plugin_config("producer", json!({ "greeting": "Hi" })).await?;
//! manager.shutdown().await;
//! ```

pub mod plugin;
pub mod service;

// Re-exports: Plugin
pub use plugin::{
    DiscoveredPlugin,
    DiscoveryReport,
    EventBusHandle,
    LoadedModule,
    ModuleExports,
    // Loader
    ModuleLoader,
    NativeModuleLoader,
    // Context
    PluginContext,
    PluginDiscovery,
    PluginKind,
    PluginLogger,
    // Manager
    PluginManager,
    PluginManagerConfig,
    // Manifest
    PluginManifest,
    PluginModule,
    PluginSnapshot,
    PluginStatus,
    RuntimeError,
    SkippedPlugin,
    MANIFEST_FILE,
};

// Re-exports: Service
pub use service::{
    method_fn, ServiceDefinition, ServiceInfo, ServiceMethod, ServiceRegistry,
    ServiceRegistryHandle,
};

// Layer1 re-exports
pub use harbor_foundation::{Error, EventBus, Result};

/// Layer2 버전
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
