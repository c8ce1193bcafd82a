//! Durable key/value configuration and service state.

pub mod record;
pub mod registry;
pub mod write;

pub use record::{is_sensitive_key, ConfigRecord};
pub use registry::{validate_name, ServiceKind, ServiceRegistry};
pub use write::{safe_write, DEFAULT_MODE};
