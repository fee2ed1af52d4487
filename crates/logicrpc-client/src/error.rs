use std::time::Duration;

use logicrpc_frame::FrameError;

/// A fault on the shared connection.
///
/// Every call pending on a connection receives the same fault when that
/// connection is reset, so the type is cheap to clone and carries its
/// detail as text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportFault {
    /// The socket could not be opened.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The connection was closed or failed while in use.
    #[error("transport closed: {0}")]
    TransportClosed(String),

    /// The peer sent bytes that could not be parsed.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl TransportFault {
    /// Whether reconnecting could plausibly cure this fault.
    ///
    /// A backend that sent garbage once will likely do it again, so
    /// malformed payloads are surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::MalformedPayload(_))
    }

    /// Classify a frame-layer failure seen on a live connection.
    pub fn from_frame(err: &FrameError) -> Self {
        match err {
            FrameError::ConnectionClosed => Self::TransportClosed("connection closed by peer".into()),
            FrameError::Io(e) => Self::TransportClosed(e.to_string()),
            FrameError::PayloadTooLarge { .. }
            | FrameError::MalformedPayload(_)
            | FrameError::Encode(_) => Self::MalformedPayload(err.to_string()),
        }
    }
}

/// Errors surfaced to callers of [`crate::Client`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The socket could not be opened.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The connection closed before the reply arrived.
    #[error("transport closed: {0}")]
    TransportClosed(String),

    /// The backend sent bytes that could not be parsed.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The backend executed the call and reported failure.
    #[error("remote error: {0}")]
    RemoteError(String),

    /// The reply data does not have the shape the caller expected.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A correlation ID was registered twice on one connection.
    #[error("correlation id {0} is already pending")]
    DuplicateId(u32),

    /// Every attempt failed with a transport fault.
    #[error("transport unavailable after {attempts} attempt(s): {last}")]
    TransportUnavailable { attempts: u32, last: TransportFault },

    /// Call params could not be turned into a request payload.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The encoded request exceeds the configured frame limit.
    #[error("request too large ({size} bytes, max {max})")]
    RequestTooLarge { size: usize, max: usize },

    /// No reply arrived within the call deadline.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the call.
    #[error("call cancelled")]
    Cancelled,

    /// Every correlation ID is held by an in-flight call.
    #[error("no free correlation id")]
    IdsExhausted,

    /// Schema validation error.
    #[cfg(feature = "schema")]
    #[error("schema validation error: {0}")]
    Schema(#[from] logicrpc_schema::SchemaError),
}

impl ClientError {
    /// True for connection-level failures, including exhausted retries.
    pub fn is_transport_fault(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed(_)
                | Self::TransportClosed(_)
                | Self::MalformedPayload(_)
                | Self::TransportUnavailable { .. }
        )
    }
}

impl From<TransportFault> for ClientError {
    fn from(fault: TransportFault) -> Self {
        match fault {
            TransportFault::ConnectFailed(msg) => Self::ConnectFailed(msg),
            TransportFault::TransportClosed(msg) => Self::TransportClosed(msg),
            TransportFault::MalformedPayload(msg) => Self::MalformedPayload(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
