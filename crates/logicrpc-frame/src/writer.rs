use std::io::ErrorKind;

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `AsyncWrite` stream.
///
/// Each frame is encoded into one buffer and written in full before `send`
/// returns.
///
/// `send` is not cancel-safe: dropping it mid-write leaves a partial frame
/// on the stream. Drive a shared writer from one task that runs every send
/// to completion.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: AsyncWrite + Unpin> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send a payload under `correlation_id`, then flush.
    pub async fn send(&mut self, correlation_id: u32, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(correlation_id, payload, &mut self.buf)?;

        self.inner
            .write_all(&self.buf)
            .await
            .map_err(map_write_error)?;
        self.flush().await
    }

    async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await.map_err(map_write_error)
    }
}

fn map_write_error(err: std::io::Error) -> FrameError {
    match err.kind() {
        ErrorKind::WriteZero | ErrorKind::BrokenPipe => FrameError::ConnectionClosed,
        _ => FrameError::Io(err),
    }
}
