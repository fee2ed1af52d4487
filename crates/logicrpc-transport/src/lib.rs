//! Local transport for the logic RPC client.
//!
//! Only Unix domain sockets are supported: the client talks to a backend
//! "logic" service that listens on a filesystem socket path. This is the
//! lowest layer of logicrpc. Everything else builds on the
//! [`tokio::net::UnixStream`] returned by [`UdsConnector::connect`].

pub mod error;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};

#[cfg(unix)]
pub use uds::{connect, UdsConnector, DEFAULT_SOCKET_PATH};
