//! Plugin Manager - 플러그인 라이프사이클 관리
//!
//! - 발견 → 설정 로드/검증 → 모듈 로드 → init → 서비스 연결
//! - 모든 라이프사이클 작업은 lifecycle gate로 직렬화
//! - 플러그인 레코드는 매니저만 변경하며, 외부에는 스냅샷만 제공
//! - 플러그인이 `ctx.report_error`로 보고한 오류는 다음 작업 시작 시 반영

use super::context::{EventBusHandle, PluginContext, RuntimeError};
use super::discovery::{DiscoveryReport, PluginDiscovery, MANIFEST_FILE};
use super::manifest::{PluginKind, PluginManifest};
use super::module::{LoadedModule, ModuleLoader};
use super::status::PluginStatus;
use crate::service::ServiceRegistry;
use harbor_foundation::{
    topics, AppConfig, ConfigSchema, Error, EventBus, PluginRegistryFile, Result, SettingsStore,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

// ============================================================================
// PluginManagerConfig
// ============================================================================

/// 플러그인 매니저 설정
#[derive(Debug, Clone)]
pub struct PluginManagerConfig {
    /// 플러그인 검색 경로 (순서대로, 먼저 발견된 ID 우선)
    pub plugin_dirs: Vec<PathBuf>,

    /// 플러그인별 설정 파일 디렉토리
    pub config_dir: PathBuf,

    /// 플러그인 레지스트리 파일
    pub registry_path: PathBuf,

    /// 매니페스트 파일명
    pub manifest_file_name: String,

    /// 처음 발견된 플러그인을 활성 상태로 등록
    pub auto_enable_new: bool,
}

impl Default for PluginManagerConfig {
    fn default() -> Self {
        let base = AppConfig::default_dir().unwrap_or_else(|_| PathBuf::from(".harbor"));
        Self::from_app_config(&AppConfig::default(), base)
    }
}

impl PluginManagerConfig {
    /// 앱 설정에서 생성 (상대 경로는 `base` 기준)
    pub fn from_app_config(app: &AppConfig, base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            plugin_dirs: app.plugin_dir_paths(base),
            config_dir: app.config_dir_path(base),
            registry_path: app.registry_path(base),
            manifest_file_name: MANIFEST_FILE.to_string(),
            auto_enable_new: true,
        }
    }

    /// `root/plugins`, `root/config`, `root/plugins.json`
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self::from_app_config(&AppConfig::default(), root)
    }

    pub fn with_plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_dirs.push(dir.into());
        self
    }

    pub fn with_auto_enable_new(mut self, enabled: bool) -> Self {
        self.auto_enable_new = enabled;
        self
    }
}

// ============================================================================
// LoadedPlugin / PluginSnapshot
// ============================================================================

/// 플러그인 런타임 레코드 (매니저 전용)
struct LoadedPlugin {
    manifest: PluginManifest,
    path: PathBuf,
    status: PluginStatus,
    error: Option<String>,
    enabled: bool,
    load_order: usize,

    /// 로드할 때마다 증가. 이전 인스턴스의 컨텍스트가 보낸 오류 구분용
    generation: u64,

    /// 컨텍스트와 공유하는 설정
    config: Arc<parking_lot::RwLock<Value>>,

    module: Option<LoadedModule>,
    events: Option<EventBusHandle>,
}

impl LoadedPlugin {
    fn new(manifest: PluginManifest, path: PathBuf, enabled: bool, load_order: usize) -> Self {
        let config = manifest.default_config();
        Self {
            manifest,
            path,
            status: PluginStatus::Discovered,
            error: None,
            enabled,
            load_order,
            generation: 0,
            config: Arc::new(parking_lot::RwLock::new(config)),
            module: None,
            events: None,
        }
    }

    fn transition(&mut self, next: PluginStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                plugin_id: self.manifest.id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        debug!(plugin_id = %self.manifest.id, "{} -> {}", self.status, next);
        self.status = next;
        Ok(())
    }

    /// ERROR로 전이하고 메시지 보존
    fn fail(&mut self, message: String) {
        if let Err(e) = self.transition(PluginStatus::Error) {
            warn!("{}", e);
            return;
        }
        self.error = Some(message);
    }

    fn snapshot(&self) -> PluginSnapshot {
        PluginSnapshot {
            id: self.manifest.id.clone(),
            name: self.manifest.name.clone(),
            version: self.manifest.version.clone(),
            plugin_type: self.manifest.plugin_type,
            status: self.status,
            error: self.error.clone(),
            enabled: self.enabled,
            permissions: self.manifest.permissions.clone(),
            services: self.manifest.services.clone(),
            path: self.path.clone(),
        }
    }
}

/// UI용 플러그인 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSnapshot {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub plugin_type: PluginKind,
    pub status: PluginStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub enabled: bool,
    pub permissions: Vec<String>,
    pub services: Vec<String>,
    pub path: PathBuf,
}

// ============================================================================
// PluginManager
// ============================================================================

/// 플러그인 매니저 - 전체 플러그인 시스템 관리
pub struct PluginManager {
    config: PluginManagerConfig,
    discovery: PluginDiscovery,
    loader: Arc<dyn ModuleLoader>,
    event_bus: Arc<EventBus>,
    services: Arc<ServiceRegistry>,

    /// 플러그인 설정 파일 저장소 (config_dir 기준)
    settings: SettingsStore,

    /// 플러그인 레코드 (ID -> LoadedPlugin)
    plugins: RwLock<HashMap<String, LoadedPlugin>>,
    load_counter: AtomicUsize,

    /// 라이프사이클 작업 직렬화
    lifecycle: Mutex<()>,

    error_tx: mpsc::UnboundedSender<RuntimeError>,
    error_rx: parking_lot::Mutex<mpsc::UnboundedReceiver<RuntimeError>>,
}

impl PluginManager {
    /// 새 매니저 생성 (전용 이벤트 버스)
    pub fn new(config: PluginManagerConfig, loader: Arc<dyn ModuleLoader>) -> Self {
        Self::with_event_bus(config, loader, Arc::new(EventBus::new()))
    }

    /// 기존 이벤트 버스와 함께 생성
    pub fn with_event_bus(
        config: PluginManagerConfig,
        loader: Arc<dyn ModuleLoader>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let discovery = PluginDiscovery::new(config.plugin_dirs.clone())
            .with_manifest_file_name(config.manifest_file_name.clone());
        let services = Arc::new(ServiceRegistry::new(Arc::clone(&event_bus)));
        let settings = SettingsStore::new(config.config_dir.clone());
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        Self {
            config,
            discovery,
            loader,
            event_bus,
            services,
            settings,
            plugins: RwLock::new(HashMap::new()),
            load_counter: AtomicUsize::new(0),
            lifecycle: Mutex::new(()),
            error_tx,
            error_rx: parking_lot::Mutex::new(error_rx),
        }
    }

    // ========================================================================
    // 접근자
    // ========================================================================

    pub fn config(&self) -> &PluginManagerConfig {
        &self.config
    }

    /// 이벤트 버스 접근
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// 서비스 레지스트리 접근 (호스트 전용)
    pub fn service_registry(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    // ========================================================================
    // 발견 / 로드
    // ========================================================================

    /// 매니페스트 발견 + 레지스트리 동기화
    pub async fn discover(&self) -> Result<DiscoveryReport> {
        let _gate = self.lifecycle.lock().await;
        self.drain_runtime_errors().await;
        self.discover_locked().await
    }

    /// 단일 플러그인 로드 (DISCOVERED → LOADING → ACTIVE | ERROR)
    pub async fn load_plugin(&self, id: &str) -> Result<()> {
        let _gate = self.lifecycle.lock().await;
        self.drain_runtime_errors().await;
        self.load_locked(id).await
    }

    /// 발견 후 활성화된 플러그인을 순서대로 로드
    ///
    /// 한 플러그인의 실패는 레코드에 기록되고 나머지 로드는 계속됩니다.
    pub async fn load_all(&self) -> Result<Vec<PluginSnapshot>> {
        let _gate = self.lifecycle.lock().await;
        self.drain_runtime_errors().await;

        let report = self.discover_locked().await?;

        for found in &report.plugins {
            let id = found.manifest.id.as_str();
            let state = {
                let plugins = self.plugins.read().await;
                plugins.get(id).map(|r| (r.status, r.enabled))
            };

            match state {
                Some((PluginStatus::Discovered, false)) => {
                    let mut plugins = self.plugins.write().await;
                    if let Some(record) = plugins.get_mut(id) {
                        record.transition(PluginStatus::Inactive)?;
                    }
                    info!(plugin_id = %id, "Plugin is disabled, not loading");
                }
                Some((PluginStatus::Discovered, true)) => {
                    if let Err(e) = self.load_locked(id).await {
                        warn!(plugin_id = %id, "Plugin failed to load: {}", e);
                    }
                }
                _ => {}
            }
        }

        Ok(self.snapshots().await)
    }

    // ========================================================================
    // 언로드 / 활성화 / 비활성화 / 리로드
    // ========================================================================

    /// ACTIVE → INACTIVE, `plugin:<id>-unloaded` 발행
    pub async fn unload_plugin(&self, id: &str) -> Result<()> {
        let _gate = self.lifecycle.lock().await;
        self.drain_runtime_errors().await;
        self.unload_locked(id, topics::plugin_unloaded(id)).await?;
        Ok(())
    }

    /// 중지 + 레지스트리에 `enabled=false` 저장, `plugin:<id>-stopped` 발행
    pub async fn disable_plugin(&self, id: &str) -> Result<()> {
        let _gate = self.lifecycle.lock().await;
        self.drain_runtime_errors().await;

        let status = self.set_enabled_locked(id, false).await?;
        match status {
            PluginStatus::Active => {
                self.unload_locked(id, topics::plugin_stopped(id)).await?;
            }
            PluginStatus::Discovered => {
                let mut plugins = self.plugins.write().await;
                if let Some(record) = plugins.get_mut(id) {
                    record.transition(PluginStatus::Inactive)?;
                }
            }
            _ => {}
        }

        info!(plugin_id = %id, "Plugin disabled");
        Ok(())
    }

    /// 레지스트리에 `enabled=true` 저장 후 로드
    pub async fn enable_plugin(&self, id: &str) -> Result<()> {
        let _gate = self.lifecycle.lock().await;
        self.drain_runtime_errors().await;

        let status = self.set_enabled_locked(id, true).await?;
        info!(plugin_id = %id, "Plugin enabled");

        match status {
            PluginStatus::Active => Ok(()),
            PluginStatus::Discovered => self.load_locked(id).await,
            _ => self.reload_locked(id).await,
        }
    }

    /// 매니페스트 다시 읽고 로드 (ACTIVE면 먼저 언로드)
    pub async fn reload_plugin(&self, id: &str) -> Result<()> {
        let _gate = self.lifecycle.lock().await;
        self.drain_runtime_errors().await;
        self.reload_locked(id).await
    }

    /// 플러그인이 보고한 런타임 오류 반영 (ACTIVE → ERROR)
    pub async fn report_runtime_error(&self, id: &str, message: impl Into<String>) -> Result<()> {
        let _gate = self.lifecycle.lock().await;
        self.drain_runtime_errors().await;

        let (status, generation) = {
            let plugins = self.plugins.read().await;
            plugins
                .get(id)
                .map(|r| (r.status, r.generation))
                .ok_or_else(|| Error::PluginNotFound(id.to_string()))?
        };
        if status != PluginStatus::Active {
            return Err(Error::InvalidTransition {
                plugin_id: id.to_string(),
                from: status.to_string(),
                to: PluginStatus::Error.to_string(),
            });
        }

        self.fail_active(id, generation, message.into()).await;
        Ok(())
    }

    /// 모든 ACTIVE 플러그인 언로드 (로드 역순)
    pub async fn shutdown(&self) {
        let _gate = self.lifecycle.lock().await;
        self.drain_runtime_errors().await;

        let mut active: Vec<(usize, String)> = {
            let plugins = self.plugins.read().await;
            plugins
                .values()
                .filter(|r| r.status == PluginStatus::Active)
                .map(|r| (r.load_order, r.manifest.id.clone()))
                .collect()
        };
        active.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, id) in active {
            if let Err(e) = self.unload_locked(&id, topics::plugin_unloaded(&id)).await {
                warn!(plugin_id = %id, "Failed to unload during shutdown: {}", e);
            }
        }

        info!("Plugin manager shut down");
    }

    // ========================================================================
    // 설정
    // ========================================================================

    /// 설정 변경 - 검증 후 저장, 실행 중인 인스턴스의 `ctx.config` 갱신
    ///
    /// 검증에 실패하면 파일과 메모리 설정 모두 그대로입니다.
    pub async fn update_plugin_config(&self, id: &str, value: Value) -> Result<Value> {
        let _gate = self.lifecycle.lock().await;
        self.drain_runtime_errors().await;

        let (manifest, config_handle) = {
            let plugins = self.plugins.read().await;
            let record = plugins
                .get(id)
                .ok_or_else(|| Error::PluginNotFound(id.to_string()))?;
            (record.manifest.clone(), Arc::clone(&record.config))
        };

        let schema = manifest.validation_schema()?;
        let registry = self.load_registry().await?;
        let path = self.config_path_for(id, &registry);
        let merged = manifest.with_defaults(value);

        let stored = match self.settings.save(&path, &merged, &schema).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(plugin_id = %id, "Rejected config update: {}", e);
                return Err(e);
            }
        };

        *config_handle.write() = stored.clone();

        self.event_bus.publish(
            topics::plugin_config_updated(id),
            json!({ "id": id, "config": stored }),
        );
        info!(plugin_id = %id, "Plugin config updated");

        Ok(stored)
    }

    /// 현재 설정 - ACTIVE면 메모리 값, 아니면 디스크에서 읽음
    pub async fn plugin_config(&self, id: &str) -> Result<Value> {
        let (manifest, status, config_handle) = {
            let plugins = self.plugins.read().await;
            let record = plugins
                .get(id)
                .ok_or_else(|| Error::PluginNotFound(id.to_string()))?;
            (record.manifest.clone(), record.status, Arc::clone(&record.config))
        };

        if status == PluginStatus::Active {
            return Ok(config_handle.read().clone());
        }

        let registry = self.load_registry().await?;
        self.read_plugin_config(&manifest, &registry).await
    }

    // ========================================================================
    // 조회
    // ========================================================================

    // 조회도 gate를 잡고 대기 중인 런타임 오류를 먼저 반영
    pub async fn get_plugin(&self, id: &str) -> Option<PluginSnapshot> {
        let _gate = self.lifecycle.lock().await;
        self.drain_runtime_errors().await;
        self.plugins.read().await.get(id).map(LoadedPlugin::snapshot)
    }

    /// 플러그인 스냅샷 목록 (발견 순서)
    pub async fn get_loaded_plugins(&self) -> Vec<PluginSnapshot> {
        let _gate = self.lifecycle.lock().await;
        self.drain_runtime_errors().await;
        self.snapshots().await
    }

    pub async fn status(&self, id: &str) -> Option<PluginStatus> {
        let _gate = self.lifecycle.lock().await;
        self.drain_runtime_errors().await;
        self.plugins.read().await.get(id).map(|r| r.status)
    }

    // ========================================================================
    // 내부 - lifecycle gate를 잡은 상태에서만 호출
    // ========================================================================

    async fn discover_locked(&self) -> Result<DiscoveryReport> {
        let report = self.discovery.discover().await;
        let mut registry = self.load_registry().await?;
        let mut registry_changed = false;

        {
            let mut plugins = self.plugins.write().await;
            for found in &report.plugins {
                let id = &found.manifest.id;

                if registry.ensure(id, self.config.auto_enable_new) {
                    debug!(plugin_id = %id, "Added plugin to registry");
                    registry_changed = true;
                }
                let enabled = registry.is_enabled(id);

                match plugins.get_mut(id) {
                    Some(record) => {
                        record.enabled = enabled;
                        // 실행 중인 플러그인의 매니페스트는 reload 때 교체
                        if !matches!(record.status, PluginStatus::Active | PluginStatus::Loading) {
                            record.manifest = found.manifest.clone();
                            record.path = found.path.clone();
                        }
                    }
                    None => {
                        let order = self.load_counter.fetch_add(1, Ordering::SeqCst);
                        plugins.insert(
                            id.clone(),
                            LoadedPlugin::new(found.manifest.clone(), found.path.clone(), enabled, order),
                        );
                    }
                }
            }
        }

        if registry_changed {
            self.save_registry(&registry).await?;
        }

        Ok(report)
    }

    async fn load_locked(&self, id: &str) -> Result<()> {
        let (manifest, path, config_handle, generation) = {
            let mut plugins = self.plugins.write().await;
            let record = plugins
                .get_mut(id)
                .ok_or_else(|| Error::PluginNotFound(id.to_string()))?;

            if record.status == PluginStatus::Active {
                debug!(plugin_id = %id, "Plugin already active");
                return Ok(());
            }

            record.transition(PluginStatus::Loading)?;
            record.error = None;
            record.generation += 1;
            (
                record.manifest.clone(),
                record.path.clone(),
                Arc::clone(&record.config),
                record.generation,
            )
        };

        info!(plugin_id = %id, "Loading plugin (v{})", manifest.version);

        match self.activate(&manifest, &path, &config_handle, generation).await {
            Ok((module, events)) => {
                {
                    let mut plugins = self.plugins.write().await;
                    if let Some(record) = plugins.get_mut(id) {
                        record.transition(PluginStatus::Active)?;
                        record.module = Some(module);
                        record.events = Some(events);
                    }
                }

                self.event_bus.publish(
                    topics::plugin_loaded(id),
                    json!({ "id": id, "version": manifest.version }),
                );
                info!(plugin_id = %id, "Plugin loaded successfully");
                Ok(())
            }
            Err(e) => {
                error!(plugin_id = %id, "Plugin failed: {}", e);
                {
                    let mut plugins = self.plugins.write().await;
                    if let Some(record) = plugins.get_mut(id) {
                        record.fail(e.to_string());
                    }
                }

                self.event_bus.publish(
                    topics::plugin_error(id),
                    json!({ "id": id, "kind": e.kind(), "error": e.to_string() }),
                );
                Err(e)
            }
        }
    }

    /// 설정 → 모듈 로드 → init → 서비스 등록. 실패 시 부분 상태를 되돌림
    async fn activate(
        &self,
        manifest: &PluginManifest,
        path: &Path,
        config_handle: &Arc<parking_lot::RwLock<Value>>,
        generation: u64,
    ) -> Result<(LoadedModule, EventBusHandle)> {
        let id = manifest.id.as_str();

        let registry = self.load_registry().await?;
        let config = self.read_plugin_config(manifest, &registry).await?;
        *config_handle.write() = config;

        let module = LoadedModule::resolve(self.loader.load(manifest, path).await?);

        let events = EventBusHandle::new(Arc::clone(&self.event_bus));
        let ctx = PluginContext::new(
            id,
            generation,
            manifest.permissions.clone(),
            Arc::clone(config_handle),
            events.clone(),
            self.services.handle(id),
            self.error_tx.clone(),
        );

        // init 중에도 다른 서비스를 호출할 수 있도록 먼저 등록
        self.services
            .set_caller_permissions(id, manifest.permissions.clone());

        if let Err(e) = module.init(ctx).await {
            self.services.clear_caller(id);
            events.unsubscribe_all();
            return Err(Error::PluginInit {
                plugin_id: id.to_string(),
                message: format!("{:#}", e),
            });
        }

        if let Err(e) = self.register_module_services(manifest, &module) {
            self.teardown(id, Some(module), Some(events)).await;
            return Err(e);
        }

        Ok((module, events))
    }

    /// 모듈이 내보낸 서비스 등록 (매니페스트에 선언된 것만)
    fn register_module_services(&self, manifest: &PluginManifest, module: &LoadedModule) -> Result<()> {
        for definition in module.services() {
            if !manifest.declares_service(&definition.name) {
                warn!(
                    plugin_id = %manifest.id,
                    service = %definition.name,
                    "Service not declared in manifest, skipping"
                );
                continue;
            }
            self.services
                .register_service(&manifest.id, definition.clone())?;
        }
        Ok(())
    }

    /// 서비스/호출자 권한/구독 해제 + stop (stop 실패는 로그만)
    async fn teardown(&self, id: &str, module: Option<LoadedModule>, events: Option<EventBusHandle>) {
        self.services.unregister_owner(id);
        self.services.clear_caller(id);

        if let Some(module) = module {
            if let Err(e) = module.stop().await {
                warn!(plugin_id = %id, "Plugin stop failed: {:#}", e);
            }
        }

        if let Some(events) = events {
            let released = events.unsubscribe_all();
            if released > 0 {
                debug!(plugin_id = %id, "Released {} event subscription(s)", released);
            }
        }
    }

    /// ACTIVE → INACTIVE. 이미 INACTIVE면 false
    async fn unload_locked(&self, id: &str, topic: String) -> Result<bool> {
        let (module, events) = {
            let mut plugins = self.plugins.write().await;
            let record = plugins
                .get_mut(id)
                .ok_or_else(|| Error::PluginNotFound(id.to_string()))?;

            match record.status {
                PluginStatus::Active => {}
                PluginStatus::Inactive => return Ok(false),
                other => {
                    return Err(Error::InvalidTransition {
                        plugin_id: id.to_string(),
                        from: other.to_string(),
                        to: PluginStatus::Inactive.to_string(),
                    })
                }
            }
            (record.module.take(), record.events.take())
        };

        info!(plugin_id = %id, "Unloading plugin");
        self.teardown(id, module, events).await;

        {
            let mut plugins = self.plugins.write().await;
            if let Some(record) = plugins.get_mut(id) {
                record.transition(PluginStatus::Inactive)?;
            }
        }

        self.event_bus.publish(topic, json!({ "id": id }));
        info!(plugin_id = %id, "Plugin unloaded");
        Ok(true)
    }

    async fn reload_locked(&self, id: &str) -> Result<()> {
        if self.status_of(id).await? == PluginStatus::Active {
            self.unload_locked(id, topics::plugin_unloaded(id)).await?;
        }

        let path = {
            let mut plugins = self.plugins.write().await;
            let record = plugins
                .get_mut(id)
                .ok_or_else(|| Error::PluginNotFound(id.to_string()))?;
            if record.status != PluginStatus::Discovered {
                record.transition(PluginStatus::Discovered)?;
            }
            record.error = None;
            record.path.clone()
        };

        info!(plugin_id = %id, "Reloading plugin");

        let manifest = match self.discovery.read_manifest(&path).await {
            Ok(manifest) if manifest.id == id => manifest,
            Ok(manifest) => {
                let e = Error::manifest_validation(
                    path.display(),
                    format!("plugin id changed from '{}' to '{}'", id, manifest.id),
                );
                return Err(self.reload_failed(id, e).await);
            }
            Err(e) => return Err(self.reload_failed(id, e).await),
        };

        {
            let mut plugins = self.plugins.write().await;
            if let Some(record) = plugins.get_mut(id) {
                record.manifest = manifest;
            }
        }

        self.load_locked(id).await
    }

    /// 매니페스트 재로드 실패 → ERROR
    async fn reload_failed(&self, id: &str, e: Error) -> Error {
        warn!(plugin_id = %id, "Reload failed: {}", e);
        {
            let mut plugins = self.plugins.write().await;
            if let Some(record) = plugins.get_mut(id) {
                record.fail(e.to_string());
            }
        }
        self.event_bus.publish(
            topics::plugin_error(id),
            json!({ "id": id, "kind": e.kind(), "error": e.to_string() }),
        );
        e
    }

    /// ACTIVE 플러그인을 ERROR로 (같은 세대의 인스턴스일 때만)
    async fn fail_active(&self, id: &str, generation: u64, message: String) {
        let taken = {
            let mut plugins = self.plugins.write().await;
            match plugins.get_mut(id) {
                Some(record)
                    if record.status == PluginStatus::Active && record.generation == generation =>
                {
                    Some((record.module.take(), record.events.take()))
                }
                _ => None,
            }
        };

        let Some((module, events)) = taken else {
            debug!(
                plugin_id = %id,
                generation,
                "Ignoring runtime error for stopped plugin instance"
            );
            return;
        };

        error!(plugin_id = %id, "Plugin runtime error: {}", message);
        self.teardown(id, module, events).await;

        {
            let mut plugins = self.plugins.write().await;
            if let Some(record) = plugins.get_mut(id) {
                record.fail(message.clone());
            }
        }

        self.event_bus.publish(
            topics::plugin_error(id),
            json!({ "id": id, "kind": "runtime", "error": message }),
        );
    }

    /// 컨텍스트로 보고된 런타임 오류 반영
    async fn drain_runtime_errors(&self) {
        let pending: Vec<RuntimeError> = {
            let mut rx = self.error_rx.lock();
            let mut pending = Vec::new();
            while let Ok(e) = rx.try_recv() {
                pending.push(e);
            }
            pending
        };

        for e in pending {
            self.fail_active(&e.plugin_id, e.generation, e.message).await;
        }
    }

    async fn set_enabled_locked(&self, id: &str, enabled: bool) -> Result<PluginStatus> {
        let status = self.status_of(id).await?;

        let mut registry = self.load_registry().await?;
        registry.set_enabled(id, enabled);
        self.save_registry(&registry).await?;

        let mut plugins = self.plugins.write().await;
        if let Some(record) = plugins.get_mut(id) {
            record.enabled = enabled;
        }
        Ok(status)
    }

    async fn status_of(&self, id: &str) -> Result<PluginStatus> {
        self.plugins
            .read()
            .await
            .get(id)
            .map(|r| r.status)
            .ok_or_else(|| Error::PluginNotFound(id.to_string()))
    }

    async fn snapshots(&self) -> Vec<PluginSnapshot> {
        let plugins = self.plugins.read().await;
        let mut records: Vec<&LoadedPlugin> = plugins.values().collect();
        records.sort_by_key(|r| r.load_order);
        records.into_iter().map(LoadedPlugin::snapshot).collect()
    }

    // ========================================================================
    // 내부 - 설정 파일
    // ========================================================================

    async fn load_registry(&self) -> Result<PluginRegistryFile> {
        PluginRegistryFile::load(&self.config.registry_path).await
    }

    async fn save_registry(&self, registry: &PluginRegistryFile) -> Result<()> {
        registry.save(&self.config.registry_path).await
    }

    /// 레지스트리 `configPath` (상대 경로는 config_dir 기준)
    fn config_path_for(&self, id: &str, registry: &PluginRegistryFile) -> PathBuf {
        let relative = registry
            .get(id)
            .map(|e| e.config_path.clone())
            .unwrap_or_else(|| format!("{}.json", id));
        self.settings.resolve(relative)
    }

    /// 파일이 없으면 `configDefaults`, 있으면 기본값 위에 저장된 값을 덮음
    async fn read_plugin_config(
        &self,
        manifest: &PluginManifest,
        registry: &PluginRegistryFile,
    ) -> Result<Value> {
        let path = self.config_path_for(&manifest.id, registry);
        let persisted = self
            .settings
            .load_optional(&path, &ConfigSchema::permissive())
            .await?;

        if persisted.is_none() {
            debug!(plugin_id = %manifest.id, "No config file, using defaults");
        }
        manifest.effective_config(persisted)
    }
}
