//! Settings - JSONC 설정 파일 + 선언적 스키마
//!
//! - `jsonc`: 주석/후행 쉼표 허용 파싱
//! - `schema`: 필드 이름 → {required, default, constraint, message}
//! - `store`: 검증 로드 + 원자적 저장
//!
//! ```rust,ignore
//! let schema = ConfigSchema::new()
//!     .field("token", FieldSpec::string().required().min_length(1))
//!     .field("baseUrl", FieldSpec::string().url().default_value(json!("https://example.com")));
//!
//! let store = SettingsStore::global()?;
//! let value = store.load("my-plugin.json", &schema).await?;
//! ```

mod jsonc;
mod schema;
mod store;

pub use jsonc::{parse_jsonc, strip_json_comments, strip_trailing_commas};
pub use schema::{ConfigSchema, Constraint, FieldKind, FieldSpec};
pub use store::SettingsStore;
