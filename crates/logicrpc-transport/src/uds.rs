use std::path::{Path, PathBuf};

use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{Result, TransportError};

/// Where the logic backend listens unless configured otherwise.
pub const DEFAULT_SOCKET_PATH: &str = "/run/logic/logic.sock";

/// Unix domain socket connector.
///
/// Holds a validated filesystem socket path and opens fresh client streams
/// to it on demand. The connector never retries; callers decide whether a
/// failed connect is worth another attempt.
#[derive(Debug, Clone)]
pub struct UdsConnector {
    path: PathBuf,
}

impl UdsConnector {
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(target_os = "macos")]
    const MAX_PATH_LEN: usize = 104;
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    const MAX_PATH_LEN: usize = 104;

    /// Create a connector for `path` after validating its length.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes == 0 {
            return Err(TransportError::EmptyPath);
        }
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        Ok(Self { path })
    }

    /// Open a new stream to the socket.
    ///
    /// Missing paths, permission problems and sockets with no listener all
    /// surface as [`TransportError::Connect`] with the original I/O error.
    pub async fn connect(&self) -> Result<UnixStream> {
        let stream = UnixStream::connect(&self.path)
            .await
            .map_err(|e| TransportError::Connect {
                path: self.path.clone(),
                source: e,
            })?;
        debug!(path = ?self.path, "connected to unix domain socket");
        Ok(stream)
    }

    /// The socket path this connector dials.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Connect to a listening Unix domain socket.
pub async fn connect(path: impl AsRef<Path>) -> Result<UnixStream> {
    UdsConnector::new(path)?.connect().await
}
