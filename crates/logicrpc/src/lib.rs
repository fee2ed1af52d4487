//! Multiplexed RPC client for the logic backend.
//!
//! One persistent Unix socket carries many concurrent calls, each tagged
//! with a correlation ID. Replies are routed back to their callers as they
//! arrive, in any order, and transport faults trigger a single delayed
//! reconnect-and-retry.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix socket connect primitive
//! - [`frame`]: correlation-ID framing and msgpack call envelopes
//! - [`schema`]: optional JSON Schema checks on params and results (`schema` feature)
//! - [`client`]: connection management, multiplexing, retries and the typed facade (`client` feature)

/// Re-export transport types.
pub mod transport {
    pub use logicrpc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use logicrpc_frame::*;
}

/// Re-export schema types (requires `schema` feature).
#[cfg(feature = "schema")]
pub mod schema {
    pub use logicrpc_schema::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use logicrpc_client::*;
}

#[cfg(feature = "client")]
pub use logicrpc_client::{CallOptions, Client, ClientConfig, ClientError, ClientRegistry};
