//! Multiplexed RPC client for the logic backend.
//!
//! One [`Client`] owns one persistent Unix socket connection. Calls are
//! tagged with correlation IDs so any number of them can be in flight at
//! once; a background read loop routes each reply to the call waiting for
//! it. Transport faults tear the connection down, fail every pending call,
//! and are retried once after a fixed delay.
//!
//! ```no_run
//! # async fn run() -> logicrpc_client::Result<()> {
//! use logicrpc_client::modules::test_module::{TestParameters, TestResponse};
//! use logicrpc_client::{Client, ClientConfig};
//!
//! let client = Client::new(ClientConfig::default());
//! let response: TestResponse = client
//!     .call("test_module", "test_function", &TestParameters { value: 2 }, "session-1")
//!     .await?;
//! assert_eq!(response.result, 4);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
mod connection;
mod dispatcher;
pub mod error;
pub mod modules;
mod multiplexer;
mod orchestrator;
pub mod pending;
pub mod registry;

pub use client::{Client, DISCONNECT_CAUSE};
pub use config::{CallOptions, ClientConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
pub use error::{ClientError, Result, TransportFault};
pub use logicrpc_frame::{from_json, to_json, CallRequest, CallResponse, Payload};
pub use modules::{ModuleCall, RemoteModule};
pub use pending::{PendingSlot, PendingTable};
pub use registry::ClientRegistry;
pub use tokio_util::sync::CancellationToken;
