//! Plugin Manifest - 플러그인 메타데이터 정의 (`plugin.json`)

use harbor_foundation::{
    parse_jsonc, ConfigSchema, DeclaresPermissions, Error, FieldViolation, Result,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// 플러그인 타입
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    /// UI 패널만 제공
    #[default]
    Simple,

    /// 스키마 검증되는 설정을 가짐
    Configured,

    /// 설정 + 백그라운드 서비스
    Hybrid,
}

impl PluginKind {
    /// 설정 변경 시 스키마 검증 대상인지
    pub fn validates_config(&self) -> bool {
        matches!(self, Self::Configured | Self::Hybrid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Configured => "configured",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 플러그인 매니페스트
///
/// 필수 필드는 `id`, `main` 뿐입니다. `permissions`가 없으면 아무 권한도
/// 부여되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// 고유 플러그인 ID (예: "script-runner")
    pub id: String,

    /// 표시 이름
    #[serde(default)]
    pub name: String,

    /// 버전 (semver 문자열)
    #[serde(default = "default_version")]
    pub version: String,

    /// 설명
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// 엔트리 모듈 (플러그인 디렉토리 기준)
    pub main: String,

    /// 플러그인 타입
    #[serde(default, rename = "type")]
    pub plugin_type: PluginKind,

    /// 요청 가능한 권한 목록
    #[serde(default)]
    pub permissions: Vec<String>,

    /// 노출 예정 서비스 이름
    #[serde(default)]
    pub services: Vec<String>,

    /// 설정 기본값
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_defaults: Option<Value>,

    /// 설정 스키마 (선언적)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<Value>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

impl PluginManifest {
    /// 새 매니페스트 생성
    pub fn new(id: impl Into<String>, main: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version: default_version(),
            description: None,
            main: main.into(),
            plugin_type: PluginKind::Simple,
            permissions: Vec::new(),
            services: Vec::new(),
            config_defaults: None,
            config_schema: None,
        }
    }

    /// 빌더 패턴: 버전 설정
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// 빌더 패턴: 타입 설정
    pub fn with_type(mut self, plugin_type: PluginKind) -> Self {
        self.plugin_type = plugin_type;
        self
    }

    /// 빌더 패턴: 권한 추가
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    /// 빌더 패턴: 서비스 선언 추가
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.services.push(service.into());
        self
    }

    /// 빌더 패턴: 설정 기본값
    pub fn with_config_defaults(mut self, defaults: Value) -> Self {
        self.config_defaults = Some(defaults);
        self
    }

    /// 빌더 패턴: 설정 스키마
    pub fn with_config_schema(mut self, schema: Value) -> Self {
        self.config_schema = Some(schema);
        self
    }

    // ========================================================================
    // 파싱
    // ========================================================================

    /// JSONC 텍스트 파싱 + 필수 필드 검증
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let display = path.display();

        let raw = parse_jsonc(content).map_err(|e| Error::manifest_parse(&display, e.to_string()))?;

        let Some(object) = raw.as_object() else {
            return Err(Error::manifest_parse(&display, "manifest must be a JSON object"));
        };

        Self::check_required(object).map_err(|e| Error::manifest_validation(&display, e.to_string()))?;

        let mut manifest: PluginManifest = serde_json::from_value(raw)
            .map_err(|e| Error::manifest_validation(&display, e.to_string()))?;

        if manifest.name.is_empty() {
            manifest.name = manifest.id.clone();
        }

        manifest
            .validate()
            .map_err(|e| Error::manifest_validation(&display, e.to_string()))?;

        Ok(manifest)
    }

    /// 파일에서 로드
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::manifest_parse(path.display(), e.to_string()))?;
        Self::parse(&content, path)
    }

    fn check_required(object: &Map<String, Value>) -> std::result::Result<(), ValidationError> {
        let mut violations = Vec::new();
        for field in ["id", "main"] {
            match object.get(field) {
                Some(Value::String(s)) if !s.trim().is_empty() => {}
                Some(Value::String(_)) => {
                    violations.push(FieldViolation::new(field, "must be at least 1 character"))
                }
                Some(_) => violations.push(FieldViolation::new(field, "must be of type string")),
                None => violations.push(FieldViolation::new(field, "is required")),
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations))
        }
    }

    /// 필드 값 검증 (타입이 맞은 뒤)
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        let mut violations = Vec::new();

        if self.id.trim().is_empty() {
            violations.push(FieldViolation::new("id", "must be at least 1 character"));
        }
        if self.main.trim().is_empty() {
            violations.push(FieldViolation::new("main", "must be at least 1 character"));
        }
        if let Some(defaults) = &self.config_defaults {
            if !defaults.is_object() {
                violations.push(FieldViolation::new("configDefaults", "must be of type object"));
            }
        }
        if let Some(schema) = &self.config_schema {
            if let Err(e) = ConfigSchema::from_json(schema) {
                violations.extend(e.violations);
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations))
        }
    }

    // ========================================================================
    // 설정
    // ========================================================================

    /// 설정 기본값 (없으면 빈 객체)
    pub fn default_config(&self) -> Value {
        self.config_defaults
            .clone()
            .filter(Value::is_object)
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// 설정 스키마. 선언이 없으면 모든 객체를 허용
    pub fn config_schema(&self) -> Result<ConfigSchema> {
        match &self.config_schema {
            Some(doc) => Ok(ConfigSchema::from_json(doc)?),
            None => Ok(ConfigSchema::permissive()),
        }
    }

    /// 설정 검증 스키마 (`configured`/`hybrid`만 선언 스키마 사용)
    pub fn validation_schema(&self) -> Result<ConfigSchema> {
        if self.plugin_type.validates_config() {
            self.config_schema()
        } else {
            Ok(ConfigSchema::permissive())
        }
    }

    /// 기본값 위에 값 덮어쓰기 (최상위 필드 단위)
    pub fn with_defaults(&self, value: Value) -> Value {
        match (self.default_config(), value) {
            (Value::Object(mut merged), Value::Object(value)) => {
                merged.extend(value);
                Value::Object(merged)
            }
            (_, value) => value,
        }
    }

    /// 실제로 적용될 설정 - 저장된 값이 없으면 기본값, 결과는 검증됨
    pub fn effective_config(&self, persisted: Option<Value>) -> Result<Value> {
        let value = match persisted {
            Some(persisted) => self.with_defaults(persisted),
            None => self.default_config(),
        };
        Ok(self.validation_schema()?.validate(&value)?)
    }

    /// 서비스 선언 여부
    pub fn declares_service(&self, name: &str) -> bool {
        self.services.iter().any(|s| s == name)
    }
}

impl DeclaresPermissions for PluginManifest {
    fn holder_id(&self) -> &str {
        &self.id
    }

    fn declared_permissions(&self) -> &[String] {
        &self.permissions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_foundation::validate_permissions;
    use serde_json::json;

    fn parse(content: &str) -> Result<PluginManifest> {
        PluginManifest::parse(content, Path::new("plugins/test/plugin.json"))
    }

    #[test]
    fn test_parse_full_manifest() {
        let manifest = parse(
            r#"{
                // 스크립트 실행기
                "id": "script-runner",
                "name": "Script Runner",
                "version": "1.2.0",
                "main": "index",
                "type": "hybrid",
                "permissions": ["process:execute", "filesystem:read"],
                "services": ["scripts"],
                "configDefaults": { "shell": "bash" },
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.id, "script-runner");
        assert_eq!(manifest.plugin_type, PluginKind::Hybrid);
        assert!(manifest.declares_service("scripts"));
        assert_eq!(manifest.default_config(), json!({ "shell": "bash" }));
    }

    #[test]
    fn test_minimal_manifest_defaults() {
        let manifest = parse(r#"{ "id": "tiny", "main": "tiny" }"#).unwrap();

        assert_eq!(manifest.name, "tiny");
        assert_eq!(manifest.version, "0.0.0");
        assert_eq!(manifest.plugin_type, PluginKind::Simple);
        assert!(manifest.permissions.is_empty());
        assert_eq!(manifest.default_config(), json!({}));
    }

    #[test]
    fn test_missing_permissions_grants_nothing() {
        let manifest = parse(r#"{ "id": "p", "main": "p" }"#).unwrap();
        let check = validate_permissions(&["filesystem:read"], &manifest);
        assert_eq!(check.denied, vec!["filesystem:read"]);
    }

    #[test]
    fn test_malformed_text_is_parse_error() {
        let err = parse(r#"{ "id": "p", "main": "#).unwrap_err();
        assert_eq!(err.kind(), "manifest_parse");
    }

    #[test]
    fn test_missing_required_fields() {
        let err = parse(r#"{ "name": "no id" }"#).unwrap_err();
        assert_eq!(err.kind(), "manifest_validation");
        let message = err.to_string();
        assert!(message.contains("id: is required"));
        assert!(message.contains("main: is required"));
    }

    #[test]
    fn test_unknown_type_is_validation_error() {
        let err = parse(r#"{ "id": "p", "main": "p", "type": "exotic" }"#).unwrap_err();
        assert_eq!(err.kind(), "manifest_validation");
    }

    #[test]
    fn test_config_schema_from_manifest() {
        let manifest = PluginManifest::new("links", "links")
            .with_type(PluginKind::Configured)
            .with_config_schema(json!({
                "baseUrl": { "type": "string", "format": "url", "required": true }
            }));

        let schema = manifest.config_schema().unwrap();
        let err = schema.validate(&json!({ "baseUrl": "nope" })).unwrap_err();
        assert_eq!(err.messages_for("baseUrl"), vec!["must be a valid URL"]);
    }

    #[test]
    fn test_effective_config() {
        let manifest = PluginManifest::new("feed", "feed")
            .with_type(PluginKind::Hybrid)
            .with_config_defaults(json!({ "interval": 5, "label": "default" }))
            .with_config_schema(json!({
                "label": { "type": "string", "minLength": 1 }
            }));

        assert_eq!(
            manifest.effective_config(None).unwrap(),
            json!({ "interval": 5, "label": "default" })
        );
        assert_eq!(
            manifest.effective_config(Some(json!({ "label": "mine" }))).unwrap(),
            json!({ "interval": 5, "label": "mine" })
        );

        let err = manifest
            .effective_config(Some(json!({ "label": "" })))
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        // simple 타입은 선언 스키마를 쓰지 않음
        let simple = manifest.clone().with_type(PluginKind::Simple);
        assert!(simple.effective_config(Some(json!({ "label": "" }))).is_ok());
        assert_eq!(simple.with_defaults(json!("raw")), json!("raw"));
    }
}
