//! Settings Store - 스키마 검증 JSONC 파일 저장소
//!
//! - 로드: JSONC 파싱 → 스키마 검증 → 기본값 채움
//! - 저장: 재검증 → 임시 파일 기록 → rename (부분 기록된 파일이 보이지 않음)

use super::jsonc::parse_jsonc;
use super::schema::ConfigSchema;
use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// 설정 파일 저장소
///
/// 상대 경로는 `base_dir` 기준으로 해석하고, 절대 경로는 그대로 사용합니다.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    base_dir: PathBuf,
}

impl SettingsStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// 글로벌 설정 (~/.config/harbor/)
    pub fn global() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Cannot find config directory".to_string()))?
            .join("harbor");
        Ok(Self::new(dir))
    }

    /// 프로젝트 설정 (.harbor/)
    pub fn project(root: impl Into<PathBuf>) -> Self {
        Self::new(root.into().join(".harbor"))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// 경로 해석
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// 파일 존재 여부
    pub async fn exists(&self, path: impl AsRef<Path>) -> bool {
        fs::try_exists(self.resolve(path)).await.unwrap_or(false)
    }

    // ========================================================================
    // 로드
    // ========================================================================

    /// 파일이 없으면 `None`, 있으면 검증된 값
    pub async fn load_optional(
        &self,
        path: impl AsRef<Path>,
        schema: &ConfigSchema,
    ) -> Result<Option<Value>> {
        let path = self.resolve(path);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let raw = parse_jsonc(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        let value = schema.validate(&raw).map_err(|e| {
            warn!("Settings at {} failed validation: {}", path.display(), e);
            Error::Validation(e)
        })?;

        debug!("Loaded settings from {}", path.display());
        Ok(Some(value))
    }

    /// 검증된 값 로드. 파일이 없으면 스키마 기본값을 반환 (기록은 호출자 책임)
    pub async fn load(&self, path: impl AsRef<Path>, schema: &ConfigSchema) -> Result<Value> {
        let path = path.as_ref();
        match self.load_optional(path, schema).await? {
            Some(value) => Ok(value),
            None => {
                debug!(
                    "Settings file {} not found, using schema defaults",
                    self.resolve(path).display()
                );
                Ok(schema.default_value())
            }
        }
    }

    /// 타입으로 로드
    pub async fn load_as<T: DeserializeOwned>(
        &self,
        path: impl AsRef<Path>,
        schema: &ConfigSchema,
    ) -> Result<T> {
        let value = self.load(path, schema).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// 로드 실패 시 `T::default()` (경고 로그)
    pub async fn load_or_default<T: DeserializeOwned + Default>(
        &self,
        path: impl AsRef<Path>,
        schema: &ConfigSchema,
    ) -> T {
        let path = path.as_ref();
        match self.load_as(path, schema).await {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Failed to load {}, using defaults: {}",
                    self.resolve(path).display(),
                    e
                );
                T::default()
            }
        }
    }

    // ========================================================================
    // 저장
    // ========================================================================

    /// 검증 후 원자적 저장 - 검증 실패 시 기존 파일은 건드리지 않음
    pub async fn save(
        &self,
        path: impl AsRef<Path>,
        value: &Value,
        schema: &ConfigSchema,
    ) -> Result<Value> {
        let validated = schema.validate(value)?;
        let path = self.resolve(path);

        let content = serde_json::to_string_pretty(&validated)
            .map_err(|e| Error::Config(format!("Failed to serialize: {}", e)))?;

        write_atomic(&path, content.as_bytes()).await?;

        debug!("Saved settings to {}", path.display());
        Ok(validated)
    }

    /// 타입으로 저장
    pub async fn save_as<T: Serialize>(
        &self,
        path: impl AsRef<Path>,
        value: &T,
        schema: &ConfigSchema,
    ) -> Result<Value> {
        let value = serde_json::to_value(value)?;
        self.save(path, &value, schema).await
    }
}

/// 임시 파일에 기록한 뒤 rename
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::Config(format!("Failed to create directory {}: {}", parent.display(), e))
            })?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Config(format!("Invalid settings path: {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    fs::write(&tmp, bytes)
        .await
        .map_err(|e| Error::Config(format!("Failed to write {}: {}", tmp.display(), e)))?;

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(Error::Config(format!(
            "Failed to replace {}: {}",
            path.display(),
            e
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::FieldSpec;
    use serde_json::json;
    use tempfile::TempDir;

    fn schema() -> ConfigSchema {
        ConfigSchema::new()
            .field("name", FieldSpec::string().required().min_length(1))
            .field("enabled", FieldSpec::boolean().default_value(json!(true)))
    }

    #[tokio::test]
    async fn test_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path());

        let value = store.load("missing.json", &schema()).await.unwrap();
        assert_eq!(value, json!({ "enabled": true }));
        assert!(store.load_optional("missing.json", &schema()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_jsonc() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path());
        std::fs::write(
            dir.path().join("app.json"),
            "{\n  // display name\n  \"name\": \"harbor\",\n}\n",
        )
        .unwrap();

        let value = store.load("app.json", &schema()).await.unwrap();
        assert_eq!(value["name"], "harbor");
        assert_eq!(value["enabled"], true);
    }

    #[tokio::test]
    async fn test_load_reports_violations() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path());
        std::fs::write(dir.path().join("app.json"), r#"{ "name": "" }"#).unwrap();

        let err = store.load("app.json", &schema()).await.unwrap_err();
        let violations = err.as_validation().unwrap();
        assert_eq!(violations.messages_for("name"), vec!["must be at least 1 character"]);
    }

    #[tokio::test]
    async fn test_save_roundtrip_creates_dirs() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path());

        let saved = store
            .save("nested/deeper/app.json", &json!({ "name": "x" }), &schema())
            .await
            .unwrap();
        assert_eq!(saved["enabled"], true);

        let loaded = store.load("nested/deeper/app.json", &schema()).await.unwrap();
        assert_eq!(loaded, saved);

        // 임시 파일이 남지 않아야 함
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested/deeper"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_save_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path());
        let path = dir.path().join("app.json");
        std::fs::write(&path, "{ \"name\": \"before\" } // keep me").unwrap();
        let before = std::fs::read(&path).unwrap();

        let err = store
            .save("app.json", &json!({ "name": "" }), &schema())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "validation");
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_absolute_path_is_kept() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new("/nonexistent-base");
        let abs = dir.path().join("abs.json");

        store.save(&abs, &json!({ "name": "a" }), &schema()).await.unwrap();
        assert!(abs.exists());
    }
}
