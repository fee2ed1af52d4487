use std::fmt;
use std::io;

use logicrpc_client::ClientError;
use logicrpc_schema::SchemaError;

// Exit codes follow sysexits-style conventions plus the usual shell codes
// for timeouts and interrupts.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const REMOTE_ERROR: i32 = 70;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
pub const INTERRUPTED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        io::ErrorKind::TimedOut => TIMEOUT,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    let code = match &err {
        ClientError::ConnectFailed(_)
        | ClientError::TransportClosed(_)
        | ClientError::TransportUnavailable { .. } => TRANSPORT_ERROR,
        ClientError::MalformedPayload(_)
        | ClientError::SchemaMismatch(_)
        | ClientError::RequestTooLarge { .. }
        | ClientError::Schema(_) => DATA_INVALID,
        ClientError::InvalidParams(_) => USAGE,
        ClientError::RemoteError(_) => REMOTE_ERROR,
        ClientError::Timeout(_) => TIMEOUT,
        ClientError::Cancelled => INTERRUPTED,
        ClientError::DuplicateId(_) | ClientError::IdsExhausted => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn schema_error(context: &str, err: SchemaError) -> CliError {
    let code = match &err {
        SchemaError::LoadFailed(_) | SchemaError::CompileFailed(_) => USAGE,
        _ => DATA_INVALID,
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use logicrpc_client::TransportFault;

    use super::*;

    #[test]
    fn transport_failures_exit_3() {
        let err = ClientError::TransportUnavailable {
            attempts: 2,
            last: TransportFault::ConnectFailed("refused".into()),
        };
        assert_eq!(client_error("call failed", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn remote_and_timeout_codes() {
        assert_eq!(
            client_error("x", ClientError::RemoteError("module not found".into())).code,
            REMOTE_ERROR
        );
        assert_eq!(
            client_error("x", ClientError::Timeout(Duration::from_secs(1))).code,
            TIMEOUT
        );
        assert_eq!(client_error("x", ClientError::Cancelled).code, INTERRUPTED);
    }

    #[test]
    fn message_keeps_context() {
        let err = client_error("call failed", ClientError::SchemaMismatch("bad".into()));
        assert_eq!(err.code, DATA_INVALID);
        assert_eq!(err.to_string(), "call failed: schema mismatch: bad");
    }

    #[test]
    fn missing_file_is_usage() {
        let err = io_error("read", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.code, USAGE);
    }
}
