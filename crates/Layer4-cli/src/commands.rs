//! CLI commands - 플러그인 모듈은 로드하지 않고 발견/설정/검증만 수행

use anyhow::Context;
use harbor_core::{
    NativeModuleLoader, PluginDiscovery, PluginManager, PluginManagerConfig, PluginSnapshot,
};
use harbor_foundation::{
    parse_jsonc, AppConfig, ConfigSchema, Error, PluginRegistryFile, SettingsStore,
    ValidationError, APP_CONFIG_FILE,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// `--config`가 없으면 `.harbor/harbor.json`, 그다음 사용자 설정 디렉토리
pub fn config_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => {
            let cwd = std::env::current_dir()?;
            Ok(AppConfig::locate(cwd)?.join(APP_CONFIG_FILE))
        }
    }
}

/// 설정 파일 기준 디렉토리 (상대 경로 해석용)
fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn print_violations(violations: &ValidationError) {
    for v in &violations.violations {
        eprintln!("  ✗ {}: {}", v.field, v.message);
    }
}

// ============================================================================
// Host
// ============================================================================

/// 앱 설정으로 구성한 플러그인 매니저 (모듈 로드 없음)
pub struct Host {
    manager: PluginManager,
}

impl Host {
    pub fn new(config_path: PathBuf, app: AppConfig) -> Self {
        let config = PluginManagerConfig::from_app_config(&app, base_dir(&config_path));
        // 모듈 테이블은 임베딩 애플리케이션에 컴파일되므로 비어 있음
        let manager = PluginManager::new(config, Arc::new(NativeModuleLoader::new()));

        Self { manager }
    }

    /// `harbor list`
    pub async fn list(&self) -> anyhow::Result<ExitCode> {
        let report = self.manager.discover().await?;
        let plugins = self.manager.get_loaded_plugins().await;

        if plugins.is_empty() {
            println!("No plugins found.");
        } else {
            println!("\n📦 Plugins\n");
            println!(
                "{:<20} {:<10} {:<11} {:<8} {}",
                "ID", "Version", "Type", "Enabled", "Services"
            );
            println!("{}", "-".repeat(70));
            for plugin in &plugins {
                print_plugin_row(plugin);
            }
        }

        if !report.skipped.is_empty() {
            println!("\n⚠ Skipped\n");
            for skipped in &report.skipped {
                println!("  {} [{}] {}", skipped.path.display(), skipped.kind, skipped.message);
            }
        }
        println!();

        Ok(ExitCode::SUCCESS)
    }

    /// `harbor enable|disable <id>` - 레지스트리만 수정
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> anyhow::Result<ExitCode> {
        self.manager.discover().await?;
        if self.manager.get_plugin(id).await.is_none() {
            eprintln!("Plugin not found: {}", id);
            return Ok(ExitCode::FAILURE);
        }

        let registry_path = &self.manager.config().registry_path;
        let mut registry = PluginRegistryFile::load(registry_path).await?;
        registry.set_enabled(id, enabled);
        registry
            .save(registry_path)
            .await
            .with_context(|| format!("Failed to write {}", registry_path.display()))?;

        let state = if enabled { "enabled" } else { "disabled" };
        println!("✓ Plugin '{}' {}", id, state);
        Ok(ExitCode::SUCCESS)
    }

    /// `harbor config get <id>`
    pub async fn config_get(&self, id: &str) -> anyhow::Result<ExitCode> {
        self.manager.discover().await?;

        match self.manager.plugin_config(id).await {
            Ok(config) => {
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(ExitCode::SUCCESS)
            }
            Err(Error::Validation(violations)) => {
                eprintln!("Stored config for '{}' is invalid:", id);
                print_violations(&violations);
                Ok(ExitCode::FAILURE)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `harbor config set <id> <json>` - 검증 실패 시 파일은 그대로
    pub async fn config_set(&self, id: &str, json: &str) -> anyhow::Result<ExitCode> {
        let value = parse_jsonc(json).context("Config must be a JSON document")?;
        self.manager.discover().await?;

        match self.manager.update_plugin_config(id, value).await {
            Ok(stored) => {
                println!("✓ Saved config for '{}'", id);
                println!("{}", serde_json::to_string_pretty(&stored)?);
                Ok(ExitCode::SUCCESS)
            }
            Err(Error::Validation(violations)) => {
                eprintln!("Config for '{}' rejected:", id);
                print_violations(&violations);
                Ok(ExitCode::FAILURE)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn print_plugin_row(plugin: &PluginSnapshot) {
    println!(
        "{:<20} {:<10} {:<11} {:<8} {}",
        plugin.id,
        plugin.version,
        plugin.plugin_type.as_str(),
        if plugin.enabled { "yes" } else { "no" },
        plugin.services.join(", ")
    );
}

// ============================================================================
// check
// ============================================================================

/// `harbor check` - 아무것도 쓰지 않고 설정/레지스트리/매니페스트 검증
pub async fn check(
    config_path: &Path,
    app: harbor_foundation::Result<AppConfig>,
) -> anyhow::Result<ExitCode> {
    let mut problems = 0usize;

    let app = match app {
        Ok(app) => {
            println!("✓ {}", config_path.display());
            app
        }
        Err(e) => {
            eprintln!("✗ {}: {}", config_path.display(), e);
            if let Some(violations) = e.as_validation() {
                print_violations(violations);
            }
            return Ok(ExitCode::FAILURE);
        }
    };

    let base = base_dir(config_path);
    let registry_path = app.registry_path(&base);
    let registry = match PluginRegistryFile::load(&registry_path).await {
        Ok(registry) => {
            println!("✓ {}", registry_path.display());
            registry
        }
        Err(e) => {
            problems += 1;
            eprintln!("✗ {}: {}", registry_path.display(), e);
            PluginRegistryFile::default()
        }
    };

    let report = PluginDiscovery::new(app.plugin_dir_paths(&base)).discover().await;
    let settings = SettingsStore::new(app.config_dir_path(&base));

    for plugin in &report.plugins {
        let manifest = &plugin.manifest;
        let relative = registry
            .get(&manifest.id)
            .map(|e| e.config_path.clone())
            .unwrap_or_else(|| format!("{}.json", manifest.id));

        let persisted = settings
            .load_optional(&relative, &ConfigSchema::permissive())
            .await;
        match persisted.and_then(|p| manifest.effective_config(p)) {
            Ok(_) => println!("✓ {} ({})", manifest.id, manifest.version),
            Err(e) => {
                problems += 1;
                eprintln!("✗ {}: {}", manifest.id, e);
                if let Some(violations) = e.as_validation() {
                    print_violations(violations);
                }
            }
        }
    }

    for skipped in &report.skipped {
        problems += 1;
        eprintln!("✗ {}: {}", skipped.path.display(), skipped.message);
    }

    if problems == 0 {
        println!("\nAll good.");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("\n{} problem(s) found.", problems);
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_plugin(root: &Path, id: &str, manifest: serde_json::Value) {
        let dir = root.join("plugins").join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("plugin.json"), manifest.to_string()).unwrap();
    }

    fn host(root: &Path) -> Host {
        Host::new(root.join(APP_CONFIG_FILE), AppConfig::default())
    }

    #[test]
    fn test_base_dir() {
        assert_eq!(base_dir(Path::new("harbor.json")), PathBuf::from("."));
        assert_eq!(base_dir(Path::new("/etc/harbor/harbor.json")), PathBuf::from("/etc/harbor"));
        assert_eq!(
            config_path(Some(PathBuf::from("x.json"))).unwrap(),
            PathBuf::from("x.json")
        );
    }

    #[tokio::test]
    async fn test_set_enabled_edits_registry() {
        let root = TempDir::new().unwrap();
        write_plugin(root.path(), "notes", json!({ "id": "notes", "main": "notes" }));
        let host = host(root.path());

        assert_eq!(host.set_enabled("notes", false).await.unwrap(), ExitCode::SUCCESS);
        let registry = PluginRegistryFile::load(root.path().join("plugins.json"))
            .await
            .unwrap();
        assert!(!registry.is_enabled("notes"));

        assert_eq!(host.set_enabled("ghost", true).await.unwrap(), ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn test_config_set_rejects_invalid_document() {
        let root = TempDir::new().unwrap();
        write_plugin(
            root.path(),
            "links",
            json!({
                "id": "links",
                "main": "links",
                "type": "configured",
                "configSchema": { "baseUrl": { "type": "string", "format": "url", "required": true } }
            }),
        );
        let host = host(root.path());

        let code = host
            .config_set("links", r#"{ "baseUrl": "not a url" }"#)
            .await
            .unwrap();
        assert_eq!(code, ExitCode::FAILURE);
        assert!(!root.path().join("config/links.json").exists());

        let code = host
            .config_set("links", r#"{ "baseUrl": "https://example.com", }"#)
            .await
            .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert!(root.path().join("config/links.json").exists());
    }

    #[tokio::test]
    async fn test_check_reports_problems() {
        let root = TempDir::new().unwrap();
        let config_path = root.path().join(APP_CONFIG_FILE);
        write_plugin(root.path(), "good", json!({ "id": "good", "main": "good" }));

        let code = check(&config_path, Ok(AppConfig::default())).await.unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        // check는 레지스트리를 만들지 않음
        assert!(!root.path().join("plugins.json").exists());

        let dir = root.path().join("plugins/bad");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("plugin.json"), "{ not json").unwrap();

        let code = check(&config_path, Ok(AppConfig::default())).await.unwrap();
        assert_eq!(code, ExitCode::FAILURE);
    }
}
