//! AppConfig - 호스트 애플리케이션 설정 (`harbor.json`)

use crate::settings::{ConfigSchema, FieldSpec, SettingsStore};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// 설정 파일명
pub const APP_CONFIG_FILE: &str = "harbor.json";

/// 플러그인 레지스트리 파일명 기본값
pub const DEFAULT_REGISTRY_FILE: &str = "plugins.json";

/// 로그 레벨 허용 값
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

// ============================================================================
// AppConfig
// ============================================================================

/// Harbor 호스트 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// 플러그인 검색 디렉토리
    #[serde(default = "default_plugin_dirs")]
    pub plugin_dirs: Vec<String>,

    /// 플러그인별 설정 파일 디렉토리
    #[serde(default = "default_config_dir")]
    pub config_dir: String,

    /// 플러그인 레지스트리 파일
    #[serde(default = "default_registry_file")]
    pub registry_file: String,

    /// 로그 레벨
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// 업데이트 확인 URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_url: Option<String>,
}

fn default_plugin_dirs() -> Vec<String> {
    vec!["plugins".to_string()]
}

fn default_config_dir() -> String {
    "config".to_string()
}

fn default_registry_file() -> String {
    DEFAULT_REGISTRY_FILE.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            plugin_dirs: default_plugin_dirs(),
            config_dir: default_config_dir(),
            registry_file: default_registry_file(),
            log_level: default_log_level(),
            update_url: None,
        }
    }
}

impl AppConfig {
    /// 설정 스키마
    pub fn schema() -> ConfigSchema {
        let levels: Vec<Value> = LOG_LEVELS.iter().map(|l| json!(l)).collect();

        ConfigSchema::new()
            .field(
                "pluginDirs",
                FieldSpec::array()
                    .default_value(json!(default_plugin_dirs()))
                    .items(crate::settings::Constraint::MinLength(1)),
            )
            .field(
                "configDir",
                FieldSpec::string()
                    .default_value(json!(default_config_dir()))
                    .min_length(1),
            )
            .field(
                "registryFile",
                FieldSpec::string()
                    .default_value(json!(default_registry_file()))
                    .min_length(1),
            )
            .field(
                "logLevel",
                FieldSpec::string()
                    .default_value(json!(default_log_level()))
                    .one_of(levels),
            )
            .field("updateUrl", FieldSpec::string().url())
    }

    /// 기본 설정 디렉토리 (~/.config/harbor)
    pub fn default_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join("harbor"))
            .ok_or_else(|| Error::Config("Cannot find config directory".to_string()))
    }

    /// 프로젝트 설정 디렉토리 (.harbor/) 가 있으면 우선
    pub fn locate(project_root: impl AsRef<Path>) -> Result<PathBuf> {
        let project = project_root.as_ref().join(".harbor");
        if project.join(APP_CONFIG_FILE).is_file() {
            return Ok(project);
        }
        Self::default_dir()
    }

    /// 설정 파일 로드. 파일이 없으면 기본값
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        SettingsStore::new(".")
            .load_as(path, &Self::schema())
            .await
    }

    /// 검증 후 저장
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        SettingsStore::new(".")
            .save_as(path, self, &Self::schema())
            .await?;
        Ok(())
    }

    /// 상대 경로를 `base` 기준으로 해석
    pub fn resolve(base: impl AsRef<Path>, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            base.as_ref().join(p)
        }
    }

    pub fn plugin_dir_paths(&self, base: impl AsRef<Path>) -> Vec<PathBuf> {
        let base = base.as_ref();
        self.plugin_dirs
            .iter()
            .map(|d| Self::resolve(base, d))
            .collect()
    }

    pub fn config_dir_path(&self, base: impl AsRef<Path>) -> PathBuf {
        Self::resolve(base, &self.config_dir)
    }

    pub fn registry_path(&self, base: impl AsRef<Path>) -> PathBuf {
        Self::resolve(base, &self.registry_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load(dir.path().join(APP_CONFIG_FILE)).await.unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_schema_messages() {
        let err = AppConfig::schema()
            .validate(&json!({
                "pluginDirs": [""],
                "configDir": "",
                "logLevel": "loud",
                "updateUrl": "not a url"
            }))
            .unwrap_err();

        assert_eq!(err.messages_for("pluginDirs[0]"), vec!["must be at least 1 character"]);
        assert_eq!(err.messages_for("configDir"), vec!["must be at least 1 character"]);
        assert_eq!(
            err.messages_for("logLevel"),
            vec!["must be one of: trace, debug, info, warn, error"]
        );
        assert_eq!(err.messages_for("updateUrl"), vec!["must be a valid URL"]);
    }

    #[tokio::test]
    async fn test_load_jsonc_partial() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(APP_CONFIG_FILE);
        std::fs::write(
            &path,
            r#"{
                // only override one field
                "logLevel": "debug",
                "updateUrl": "https://updates.example.com/feed",
            }"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.plugin_dirs, vec!["plugins"]);
        assert_eq!(config.update_url.as_deref(), Some("https://updates.example.com/feed"));
    }

    #[test]
    fn test_resolve_paths() {
        let config = AppConfig {
            plugin_dirs: vec!["plugins".into(), "/opt/harbor/plugins".into()],
            ..AppConfig::default()
        };
        let dirs = config.plugin_dir_paths("/home/u/.harbor");
        assert_eq!(dirs[0], PathBuf::from("/home/u/.harbor/plugins"));
        assert_eq!(dirs[1], PathBuf::from("/opt/harbor/plugins"));
    }
}
