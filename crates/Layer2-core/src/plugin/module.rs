//! Plugin Module - 플러그인 코드 계약 + 로더
//!
//! 모듈은 `init`을 반드시 구현하고, `stop`과 서비스 테이블은 선택입니다.
//! 어떤 항목을 내보내는지는 로드 시 한 번 [`LoadedModule`]로 고정되며
//! 호출마다 다시 확인하지 않습니다.

use super::context::PluginContext;
use super::manifest::PluginManifest;
use crate::service::ServiceDefinition;
use async_trait::async_trait;
use harbor_foundation::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// PluginModule Trait
// ============================================================================

/// 모듈이 내보내는 항목
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModuleExports {
    /// `stop` 구현 여부
    pub stop: bool,

    /// 서비스 테이블 제공 여부
    pub services: bool,
}

impl ModuleExports {
    /// `init`만 내보냄
    pub fn init_only() -> Self {
        Self::default()
    }

    pub fn with_stop(mut self) -> Self {
        self.stop = true;
        self
    }

    pub fn with_services(mut self) -> Self {
        self.services = true;
        self
    }
}

/// 플러그인 모듈 트레이트
///
/// 플러그인 코드가 작성하므로 `anyhow::Result`를 사용합니다.
#[async_trait]
pub trait PluginModule: Send + Sync {
    /// 초기화 - 실패하면 플러그인은 ERROR 상태가 됨
    async fn init(&self, ctx: PluginContext) -> anyhow::Result<()>;

    /// 중지 (선택)
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// 내보내는 항목
    fn exports(&self) -> ModuleExports {
        ModuleExports::init_only()
    }

    /// 서비스 테이블 (`exports().services`일 때만 사용)
    fn services(&self) -> Vec<ServiceDefinition> {
        Vec::new()
    }
}

/// 로드 시점에 고정된 모듈 기술자
#[derive(Clone)]
pub struct LoadedModule {
    module: Arc<dyn PluginModule>,
    exports: ModuleExports,
    services: Vec<ServiceDefinition>,
}

impl LoadedModule {
    pub fn resolve(module: Arc<dyn PluginModule>) -> Self {
        let exports = module.exports();
        let services = if exports.services {
            module.services()
        } else {
            Vec::new()
        };

        Self {
            module,
            exports,
            services,
        }
    }

    pub fn exports(&self) -> ModuleExports {
        self.exports
    }

    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    pub async fn init(&self, ctx: PluginContext) -> anyhow::Result<()> {
        self.module.init(ctx).await
    }

    /// `stop`을 내보내지 않았으면 아무것도 하지 않음
    pub async fn stop(&self) -> anyhow::Result<()> {
        if self.exports.stop {
            self.module.stop().await
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("exports", &self.exports)
            .field("services", &self.services)
            .finish()
    }
}

// ============================================================================
// ModuleLoader
// ============================================================================

/// 매니페스트 `main`을 모듈로 해석
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// `plugin_dir`는 매니페스트가 있는 디렉토리
    async fn load(
        &self,
        manifest: &PluginManifest,
        plugin_dir: &Path,
    ) -> Result<Arc<dyn PluginModule>>;
}

type ModuleFactory =
    Arc<dyn Fn(&PluginManifest) -> anyhow::Result<Arc<dyn PluginModule>> + Send + Sync>;

/// 컴파일타임 플러그인 테이블 - `main` → 팩토리
///
/// ```ignore
/// let loader = NativeModuleLoader::new()
///     .with_module("producer", |_| Ok(Arc::new(Producer)))
///     .with_module("consumer", |_| Ok(Arc::new(Consumer::default())));
/// ```
#[derive(Default, Clone)]
pub struct NativeModuleLoader {
    factories: HashMap<String, ModuleFactory>,
}

impl NativeModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 팩토리 등록 (같은 엔트리면 교체)
    pub fn register<F>(&mut self, main: impl AsRef<str>, factory: F)
    where
        F: Fn(&PluginManifest) -> anyhow::Result<Arc<dyn PluginModule>> + Send + Sync + 'static,
    {
        self.factories
            .insert(normalize_entry(main.as_ref()), Arc::new(factory));
    }

    /// 빌더 패턴: 팩토리 등록
    pub fn with_module<F>(mut self, main: impl AsRef<str>, factory: F) -> Self
    where
        F: Fn(&PluginManifest) -> anyhow::Result<Arc<dyn PluginModule>> + Send + Sync + 'static,
    {
        self.register(main, factory);
        self
    }

    pub fn contains(&self, main: &str) -> bool {
        self.factories.contains_key(&normalize_entry(main))
    }

    /// 등록된 엔트리 이름 (정렬됨)
    pub fn entries(&self) -> Vec<String> {
        let mut entries: Vec<String> = self.factories.keys().cloned().collect();
        entries.sort();
        entries
    }
}

#[async_trait]
impl ModuleLoader for NativeModuleLoader {
    async fn load(
        &self,
        manifest: &PluginManifest,
        plugin_dir: &Path,
    ) -> Result<Arc<dyn PluginModule>> {
        let entry = normalize_entry(&manifest.main);
        let factory = self.factories.get(&entry).ok_or_else(|| Error::ModuleLoad {
            plugin_id: manifest.id.clone(),
            message: format!("no native module registered for entry '{}'", manifest.main),
        })?;

        debug!(plugin_id = %manifest.id, "Resolving native module '{}' from {}", entry, plugin_dir.display());

        factory(manifest).map_err(|e| Error::ModuleLoad {
            plugin_id: manifest.id.clone(),
            message: format!("{:#}", e),
        })
    }
}

/// `./index.js` → `index`
fn normalize_entry(main: &str) -> String {
    let trimmed = main.trim().trim_start_matches("./");
    let without_ext = match trimmed.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => stem,
        _ => trimmed,
    };
    without_ext.to_string()
}
