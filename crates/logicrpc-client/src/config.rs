use std::path::{Path, PathBuf};
use std::time::Duration;

use logicrpc_frame::FrameConfig;
use logicrpc_transport::DEFAULT_SOCKET_PATH;
use tokio_util::sync::CancellationToken;

/// Pause between a failed attempt and the reconnect that follows it.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Attempts per call: the first try plus one retry.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend socket path.
    pub socket_path: PathBuf,
    /// Delay before reconnecting after a transport fault.
    pub retry_delay: Duration,
    /// Upper bound on attempts per call. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Frame size limits applied in both directions.
    pub frame: FrameConfig,
    /// Deadline applied to calls that do not set their own. `None` waits
    /// until the reply arrives or the connection drops.
    pub call_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            retry_delay: DEFAULT_RETRY_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            frame: FrameConfig::default(),
            call_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_max_payload_size(mut self, max: usize) -> Self {
        self.frame.max_payload_size = max;
        self
    }

    pub(crate) fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overall deadline for the call, retries included.
    pub timeout: Option<Duration>,
    /// Abandons the call when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}
