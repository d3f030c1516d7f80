//! Config - 호스트 설정 문서
//!
//! - `app.rs` - AppConfig (`harbor.json`)
//! - `registry.rs` - 플러그인 레지스트리 파일

mod app;
mod registry;

pub use app::{AppConfig, APP_CONFIG_FILE, DEFAULT_REGISTRY_FILE, LOG_LEVELS};
pub use registry::{PluginRegistryFile, RegistryEntry};
