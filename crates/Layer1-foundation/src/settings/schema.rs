//! Config Schema - 선언적 설정 스키마
//!
//! 필드 이름 → `{required, default, constraint, message}` 형태의 작은 스키마.
//! 리플렉션 없이 `serde_json::Value`만으로 검증합니다.

use crate::error::{FieldViolation, ValidationError};
use serde_json::{Map, Value};

// ============================================================================
// FieldKind / Constraint
// ============================================================================

/// 필드 값 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Any,
}

impl FieldKind {
    /// 스키마 문서의 `"type"` 문자열 파싱
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            "any" => Some(Self::Any),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().map_or(false, |f| f.fract() == 0.0)
            }
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }
}

/// 필드 제약 조건
#[derive(Debug, Clone)]
pub enum Constraint {
    /// 값 타입
    Kind(FieldKind),

    /// 문자열 최소 길이 / 배열 최소 항목 수
    MinLength(usize),

    /// 유효한 URL 문자열
    Url,

    /// 허용 값 목록
    OneOf(Vec<Value>),

    /// 숫자 범위 (포함)
    Range { min: Option<f64>, max: Option<f64> },

    /// 배열 각 항목에 적용
    Items(Box<Constraint>),

    /// 임의 조건
    Predicate {
        check: fn(&Value) -> bool,
        description: String,
    },
}

impl Constraint {
    /// 값 검사 - 위반 사항을 `out`에 추가
    fn check(&self, value: &Value, field: &str, out: &mut Vec<FieldViolation>) {
        match self {
            Constraint::Kind(kind) => {
                if !kind.matches(value) {
                    out.push(FieldViolation::new(
                        field,
                        format!("must be of type {}", kind.as_str()),
                    ));
                }
            }
            Constraint::MinLength(min) => match value {
                Value::String(s) if s.chars().count() < *min => {
                    let unit = if *min == 1 { "character" } else { "characters" };
                    out.push(FieldViolation::new(
                        field,
                        format!("must be at least {} {}", min, unit),
                    ));
                }
                Value::Array(items) if items.len() < *min => {
                    let unit = if *min == 1 { "item" } else { "items" };
                    out.push(FieldViolation::new(
                        field,
                        format!("must contain at least {} {}", min, unit),
                    ));
                }
                _ => {}
            },
            Constraint::Url => {
                let valid = value
                    .as_str()
                    .map_or(false, |s| url::Url::parse(s).is_ok());
                if !valid {
                    out.push(FieldViolation::new(field, "must be a valid URL"));
                }
            }
            Constraint::OneOf(allowed) => {
                if !allowed.contains(value) {
                    let rendered: Vec<String> = allowed
                        .iter()
                        .map(|v| match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect();
                    out.push(FieldViolation::new(
                        field,
                        format!("must be one of: {}", rendered.join(", ")),
                    ));
                }
            }
            Constraint::Range { min, max } => {
                let Some(n) = value.as_f64() else {
                    out.push(FieldViolation::new(field, "must be a number"));
                    return;
                };
                if let Some(min) = min {
                    if n < *min {
                        out.push(FieldViolation::new(field, format!("must be at least {}", min)));
                    }
                }
                if let Some(max) = max {
                    if n > *max {
                        out.push(FieldViolation::new(field, format!("must be at most {}", max)));
                    }
                }
            }
            Constraint::Items(inner) => {
                if let Value::Array(items) = value {
                    for (i, item) in items.iter().enumerate() {
                        inner.check(item, &format!("{}[{}]", field, i), out);
                    }
                }
            }
            Constraint::Predicate { check, description } => {
                if !check(value) {
                    out.push(FieldViolation::new(field, description.clone()));
                }
            }
        }
    }
}

// ============================================================================
// FieldSpec
// ============================================================================

/// 단일 필드 명세
#[derive(Debug, Clone, Default)]
pub struct FieldSpec {
    /// 필수 여부
    pub required: bool,

    /// 값이 없을 때 채울 기본값
    pub default: Option<Value>,

    /// 제약 조건 (순서대로 검사)
    pub constraints: Vec<Constraint>,

    /// 제약 위반 시 기본 메시지 대신 사용할 메시지
    pub message: Option<String>,
}

impl FieldSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_kind(kind: FieldKind) -> Self {
        Self::new().constraint(Constraint::Kind(kind))
    }

    pub fn string() -> Self {
        Self::of_kind(FieldKind::String)
    }

    pub fn number() -> Self {
        Self::of_kind(FieldKind::Number)
    }

    pub fn integer() -> Self {
        Self::of_kind(FieldKind::Integer)
    }

    pub fn boolean() -> Self {
        Self::of_kind(FieldKind::Boolean)
    }

    pub fn array() -> Self {
        Self::of_kind(FieldKind::Array)
    }

    pub fn object() -> Self {
        Self::of_kind(FieldKind::Object)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn min_length(self, min: usize) -> Self {
        self.constraint(Constraint::MinLength(min))
    }

    pub fn url(self) -> Self {
        self.constraint(Constraint::Url)
    }

    pub fn one_of(self, values: Vec<Value>) -> Self {
        self.constraint(Constraint::OneOf(values))
    }

    pub fn range(self, min: Option<f64>, max: Option<f64>) -> Self {
        self.constraint(Constraint::Range { min, max })
    }

    pub fn items(self, inner: Constraint) -> Self {
        self.constraint(Constraint::Items(Box::new(inner)))
    }

    pub fn predicate(self, check: fn(&Value) -> bool, description: impl Into<String>) -> Self {
        self.constraint(Constraint::Predicate {
            check,
            description: description.into(),
        })
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn check(&self, value: &Value, field: &str, out: &mut Vec<FieldViolation>) {
        let mut found = Vec::new();
        for constraint in &self.constraints {
            constraint.check(value, field, &mut found);
            // 타입이 틀리면 나머지 제약은 의미 없음
            if matches!(constraint, Constraint::Kind(_)) && !found.is_empty() {
                break;
            }
        }

        // 필수 문자열은 비어 있으면 안 됨 (minLength가 따로 없을 때)
        let has_min_length = self
            .constraints
            .iter()
            .any(|c| matches!(c, Constraint::MinLength(_)));
        if found.is_empty() && self.required && !has_min_length && value.as_str() == Some("") {
            Constraint::MinLength(1).check(value, field, &mut found);
        }

        match &self.message {
            Some(message) => {
                for mut violation in found {
                    violation.message = message.clone();
                    out.push(violation);
                }
            }
            None => out.extend(found),
        }
    }
}

// ============================================================================
// ConfigSchema
// ============================================================================

/// 설정 문서 스키마
#[derive(Debug, Clone, Default)]
pub struct ConfigSchema {
    /// 선언 순서를 유지하는 필드 목록
    fields: Vec<(String, FieldSpec)>,

    /// 선언되지 않은 필드를 위반으로 보고
    strict: bool,
}

impl ConfigSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// 아무 객체나 허용하는 스키마
    pub fn permissive() -> Self {
        Self::new()
    }

    /// 필드 추가 (같은 이름이면 교체)
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        let name = name.into();
        if let Some(existing) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            existing.1 = spec;
        } else {
            self.fields.push((name, spec));
        }
        self
    }

    /// 엄격 모드
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// 필드 명세 조회
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// 선언된 필드 이름
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// 기본값만으로 채운 문서
    pub fn default_value(&self) -> Value {
        let mut map = Map::new();
        for (name, spec) in &self.fields {
            if let Some(default) = &spec.default {
                map.insert(name.clone(), default.clone());
            }
        }
        Value::Object(map)
    }

    /// 없는 필드를 기본값으로 채움 (객체가 아니면 그대로 반환)
    pub fn apply_defaults(&self, value: Value) -> Value {
        let Value::Object(mut map) = value else {
            return value;
        };

        for (name, spec) in &self.fields {
            let missing = map.get(name).map_or(true, Value::is_null);
            if missing {
                if let Some(default) = &spec.default {
                    map.insert(name.clone(), default.clone());
                }
            }
        }

        Value::Object(map)
    }

    /// 검증 - 성공 시 기본값이 채워진 문서 반환
    ///
    /// 선언되지 않은 필드는 엄격 모드가 아니면 그대로 보존됩니다.
    pub fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        let Some(object) = value.as_object() else {
            return Err(ValidationError::single("$", "must be an object"));
        };

        let mut violations = Vec::new();

        for (name, spec) in &self.fields {
            match object.get(name) {
                None | Some(Value::Null) => {
                    if spec.required && spec.default.is_none() {
                        violations.push(FieldViolation::new(name, "is required"));
                    }
                }
                Some(field_value) => spec.check(field_value, name, &mut violations),
            }
        }

        if self.strict {
            for key in object.keys() {
                if self.get(key).is_none() {
                    violations.push(FieldViolation::new(key, "is not a declared field"));
                }
            }
        }

        if violations.is_empty() {
            Ok(self.apply_defaults(value.clone()))
        } else {
            Err(ValidationError::new(violations))
        }
    }

    /// 선언적 스키마 문서 파싱
    ///
    /// ```json
    /// {
    ///   "token":   { "type": "string", "required": true, "minLength": 1 },
    ///   "baseUrl": { "type": "string", "format": "url", "default": "https://example.com" },
    ///   "mode":    { "enum": ["fast", "safe"], "message": "unknown mode" }
    /// }
    /// ```
    pub fn from_json(doc: &Value) -> Result<Self, ValidationError> {
        let Some(fields) = doc.as_object() else {
            return Err(ValidationError::single("configSchema", "must be an object"));
        };

        let mut schema = ConfigSchema::new();
        let mut violations = Vec::new();

        for (name, def) in fields {
            match parse_field_spec(name, def) {
                Ok(spec) => schema = schema.field(name.clone(), spec),
                Err(mut v) => violations.append(&mut v),
            }
        }

        if violations.is_empty() {
            Ok(schema)
        } else {
            Err(ValidationError::new(violations))
        }
    }
}

fn parse_field_spec(name: &str, def: &Value) -> Result<FieldSpec, Vec<FieldViolation>> {
    let path = format!("configSchema.{}", name);
    let Some(def) = def.as_object() else {
        return Err(vec![FieldViolation::new(path, "must be an object")]);
    };

    let mut errors = Vec::new();
    let mut spec = FieldSpec::new();

    if let Some(kind) = def.get("type") {
        match kind.as_str().and_then(FieldKind::parse) {
            Some(kind) => spec = spec.constraint(Constraint::Kind(kind)),
            None => errors.push(FieldViolation::new(
                format!("{}.type", path),
                "must be one of: string, number, integer, boolean, array, object, any",
            )),
        }
    }

    if def.get("required").and_then(Value::as_bool).unwrap_or(false) {
        spec = spec.required();
    }

    if let Some(default) = def.get("default") {
        spec = spec.default_value(default.clone());
    }

    if let Some(min) = def.get("minLength") {
        match min.as_u64() {
            Some(min) => spec = spec.min_length(min as usize),
            None => errors.push(FieldViolation::new(
                format!("{}.minLength", path),
                "must be a non-negative integer",
            )),
        }
    }

    match def.get("format").and_then(Value::as_str) {
        Some("url") => spec = spec.url(),
        Some(other) => errors.push(FieldViolation::new(
            format!("{}.format", path),
            format!("unsupported format '{}'", other),
        )),
        None => {}
    }

    if let Some(values) = def.get("enum") {
        match values.as_array() {
            Some(values) => spec = spec.one_of(values.clone()),
            None => errors.push(FieldViolation::new(format!("{}.enum", path), "must be an array")),
        }
    }

    let minimum = def.get("minimum").and_then(Value::as_f64);
    let maximum = def.get("maximum").and_then(Value::as_f64);
    if minimum.is_some() || maximum.is_some() {
        spec = spec.range(minimum, maximum);
    }

    if let Some(items) = def.get("items") {
        match items
            .get("type")
            .and_then(Value::as_str)
            .and_then(FieldKind::parse)
        {
            Some(kind) => spec = spec.items(Constraint::Kind(kind)),
            None => errors.push(FieldViolation::new(
                format!("{}.items", path),
                "must declare a valid type",
            )),
        }
    }

    if let Some(message) = def.get("message").and_then(Value::as_str) {
        spec = spec.message(message);
    }

    if errors.is_empty() {
        Ok(spec)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ConfigSchema {
        ConfigSchema::new()
            .field("name", FieldSpec::string().required().min_length(1))
            .field("homepage", FieldSpec::string().url())
            .field(
                "level",
                FieldSpec::string()
                    .one_of(vec![json!("low"), json!("high")])
                    .default_value(json!("low")),
            )
            .field("retries", FieldSpec::integer().range(Some(0.0), Some(5.0)))
    }

    #[test]
    fn test_valid_document_gets_defaults() {
        let value = sample()
            .validate(&json!({ "name": "x", "homepage": "https://a.dev" }))
            .unwrap();

        assert_eq!(value["level"], "low");
        assert_eq!(value["name"], "x");
    }

    #[test]
    fn test_field_level_messages() {
        let err = sample()
            .validate(&json!({ "name": "", "homepage": "not a url", "retries": 9 }))
            .unwrap_err();

        assert_eq!(err.messages_for("name"), vec!["must be at least 1 character"]);
        assert_eq!(err.messages_for("homepage"), vec!["must be a valid URL"]);
        assert_eq!(err.messages_for("retries"), vec!["must be at most 5"]);
    }

    #[test]
    fn test_required_and_type() {
        let err = sample().validate(&json!({ "homepage": 3 })).unwrap_err();

        assert_eq!(err.messages_for("name"), vec!["is required"]);
        assert_eq!(err.messages_for("homepage"), vec!["must be of type string"]);
    }

    #[test]
    fn test_undeclared_fields_preserved_unless_strict() {
        let doc = json!({ "name": "x", "extra": { "keep": true } });

        let value = sample().validate(&doc).unwrap();
        assert_eq!(value["extra"]["keep"], true);

        let err = sample().strict().validate(&doc).unwrap_err();
        assert_eq!(err.messages_for("extra"), vec!["is not a declared field"]);
    }

    #[test]
    fn test_required_string_must_not_be_empty() {
        let schema = ConfigSchema::from_json(&json!({
            "greeting": { "type": "string", "required": true },
            "note": { "type": "string" }
        }))
        .unwrap();

        let err = schema
            .validate(&json!({ "greeting": "", "note": "" }))
            .unwrap_err();
        assert_eq!(err.messages_for("greeting"), vec!["must be at least 1 character"]);
        assert!(err.messages_for("note").is_empty());

        assert!(schema.validate(&json!({ "greeting": "Hello" })).is_ok());
    }

    #[test]
    fn test_custom_message_overrides() {
        let schema = ConfigSchema::new().field(
            "token",
            FieldSpec::string().min_length(1).message("token must not be empty"),
        );

        let err = schema.validate(&json!({ "token": "" })).unwrap_err();
        assert_eq!(err.messages_for("token"), vec!["token must not be empty"]);
    }

    #[test]
    fn test_items_constraint_reports_index() {
        let schema = ConfigSchema::new().field(
            "dirs",
            FieldSpec::array().items(Constraint::MinLength(1)),
        );

        let err = schema.validate(&json!({ "dirs": ["a", ""] })).unwrap_err();
        assert_eq!(err.violations[0].field, "dirs[1]");
    }

    #[test]
    fn test_not_an_object() {
        let err = sample().validate(&json!([1, 2])).unwrap_err();
        assert_eq!(err.messages_for("$"), vec!["must be an object"]);
    }

    #[test]
    fn test_from_json() {
        let schema = ConfigSchema::from_json(&json!({
            "token": { "type": "string", "required": true, "minLength": 1 },
            "baseUrl": { "type": "string", "format": "url", "default": "https://example.com" },
            "mode": { "enum": ["fast", "safe"], "message": "unknown mode" },
            "tags": { "type": "array", "items": { "type": "string" } }
        }))
        .unwrap();

        let ok = schema.validate(&json!({ "token": "t" })).unwrap();
        assert_eq!(ok["baseUrl"], "https://example.com");

        let err = schema
            .validate(&json!({ "token": "", "mode": "slow", "tags": [1] }))
            .unwrap_err();
        assert_eq!(err.messages_for("token"), vec!["must be at least 1 character"]);
        assert_eq!(err.messages_for("mode"), vec!["unknown mode"]);
        assert_eq!(err.messages_for("tags[0]"), vec!["must be of type string"]);
    }

    #[test]
    fn test_from_json_rejects_bad_definitions() {
        let err = ConfigSchema::from_json(&json!({
            "a": { "type": "uuid" },
            "b": { "format": "email" }
        }))
        .unwrap_err();

        assert_eq!(err.violations.len(), 2);
    }
}
