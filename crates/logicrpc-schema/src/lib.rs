//! Optional JSON Schema validation at the call boundary.
//!
//! Schemas are registered per call target (`module_id.method`), separately
//! for the params a caller sends and the result the backend returns. The
//! client consults the registry before sending and after receiving, so a
//! contract violation surfaces as a schema mismatch instead of a confusing
//! decode failure further up.

pub mod config;
pub mod error;
pub mod registry;
pub mod validator;

pub use config::RegistryConfig;
pub use error::{Result, SchemaError};
pub use registry::{CallTarget, SchemaKind, SchemaRegistry};
