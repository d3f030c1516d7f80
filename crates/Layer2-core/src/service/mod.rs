//! # Service Registry
//!
//! 플러그인 간 RPC. 각 서비스는 `(name, version)`으로 식별되며
//! 등록한 플러그인이 소유합니다. 호출 권한은 호출자 매니페스트에
//! 선언된 권한으로만 판단합니다.

mod definition;
mod registry;

pub use definition::{method_fn, ServiceDefinition, ServiceInfo, ServiceMethod};
pub use registry::{ServiceRegistry, ServiceRegistryHandle};
