//! Plugin Registry File - 플러그인 활성화 상태 + 설정 파일 위치
//!
//! ```json
//! {
//!   "producer": { "enabled": true, "configPath": "producer.json" },
//!   "consumer": { "enabled": false, "configPath": "consumer.json" }
//! }
//! ```

use crate::settings::{ConfigSchema, SettingsStore};
use crate::{Result, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// 레지스트리 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// 플러그인 설정 파일 경로 (상대 경로는 config_dir 기준)
    pub config_path: String,
}

fn default_enabled() -> bool {
    true
}

impl RegistryEntry {
    pub fn new(config_path: impl Into<String>, enabled: bool) -> Self {
        Self {
            enabled,
            config_path: config_path.into(),
        }
    }

    /// 플러그인 ID 기반 기본 항목 (`<id>.json`)
    pub fn for_plugin(plugin_id: &str, enabled: bool) -> Self {
        Self::new(format!("{}.json", plugin_id), enabled)
    }
}

/// 레지스트리 파일 - id 순으로 정렬 저장
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginRegistryFile {
    pub plugins: BTreeMap<String, RegistryEntry>,
}

impl PluginRegistryFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// 스키마 - 임의 id 키를 허용하므로 항목 단위 검증은 `validate_entries`에서 수행
    pub fn schema() -> ConfigSchema {
        ConfigSchema::permissive()
    }

    pub fn get(&self, plugin_id: &str) -> Option<&RegistryEntry> {
        self.plugins.get(plugin_id)
    }

    pub fn contains(&self, plugin_id: &str) -> bool {
        self.plugins.contains_key(plugin_id)
    }

    /// 없을 때만 추가. 추가되었으면 true
    pub fn ensure(&mut self, plugin_id: &str, enabled: bool) -> bool {
        if self.plugins.contains_key(plugin_id) {
            return false;
        }
        self.plugins
            .insert(plugin_id.to_string(), RegistryEntry::for_plugin(plugin_id, enabled));
        true
    }

    /// 활성화 여부 변경 (항목이 없으면 생성)
    pub fn set_enabled(&mut self, plugin_id: &str, enabled: bool) {
        self.plugins
            .entry(plugin_id.to_string())
            .and_modify(|e| e.enabled = enabled)
            .or_insert_with(|| RegistryEntry::for_plugin(plugin_id, enabled));
    }

    /// 등록되지 않은 플러그인은 활성으로 간주
    pub fn is_enabled(&self, plugin_id: &str) -> bool {
        self.plugins.get(plugin_id).map_or(true, |e| e.enabled)
    }

    /// 항목 단위 검증 (`<id>.enabled`, `<id>.configPath`)
    pub fn validate_entries(value: &Value) -> std::result::Result<(), ValidationError> {
        use crate::FieldViolation;

        let Some(map) = value.as_object() else {
            return Err(ValidationError::single("$", "must be an object"));
        };

        let mut violations = Vec::new();
        for (id, entry) in map {
            let Some(entry) = entry.as_object() else {
                violations.push(FieldViolation::new(id, "must be an object"));
                continue;
            };
            if let Some(enabled) = entry.get("enabled") {
                if !enabled.is_boolean() {
                    violations.push(FieldViolation::new(
                        format!("{}.enabled", id),
                        "must be of type boolean",
                    ));
                }
            }
            match entry.get("configPath").and_then(Value::as_str) {
                Some(p) if !p.is_empty() => {}
                Some(_) => violations.push(FieldViolation::new(
                    format!("{}.configPath", id),
                    "must be at least 1 character",
                )),
                None => violations.push(FieldViolation::new(
                    format!("{}.configPath", id),
                    "is required",
                )),
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations))
        }
    }

    /// 로드. 파일이 없으면 빈 레지스트리
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let store = SettingsStore::new(".");
        let value = store.load(path, &Self::schema()).await?;
        Self::validate_entries(&value)?;
        Ok(serde_json::from_value(value)?)
    }

    /// 저장 (전체 문서 교체)
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let value = serde_json::to_value(self)?;
        Self::validate_entries(&value)?;
        SettingsStore::new(".")
            .save(path, &value, &Self::schema())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_registry_is_empty() {
        let dir = TempDir::new().unwrap();
        let registry = PluginRegistryFile::load(dir.path().join("plugins.json"))
            .await
            .unwrap();
        assert!(registry.plugins.is_empty());
        assert!(registry.is_enabled("anything"));
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plugins.json");

        let mut registry = PluginRegistryFile::new();
        assert!(registry.ensure("producer", true));
        assert!(!registry.ensure("producer", false));
        registry.set_enabled("consumer", false);
        registry.save(&path).await.unwrap();

        let loaded = PluginRegistryFile::load(&path).await.unwrap();
        assert_eq!(loaded, registry);
        assert!(loaded.is_enabled("producer"));
        assert!(!loaded.is_enabled("consumer"));
        assert_eq!(loaded.get("consumer").unwrap().config_path, "consumer.json");
    }

    #[test]
    fn test_entry_violations() {
        let err = PluginRegistryFile::validate_entries(&json!({
            "a": { "enabled": "yes", "configPath": "" },
            "b": { "enabled": true }
        }))
        .unwrap_err();

        assert_eq!(err.messages_for("a.enabled"), vec!["must be of type boolean"]);
        assert_eq!(err.messages_for("a.configPath"), vec!["must be at least 1 character"]);
        assert_eq!(err.messages_for("b.configPath"), vec!["is required"]);
    }
}
