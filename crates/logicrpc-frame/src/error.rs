/// Errors that can occur during frame and envelope encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// The frame payload is not a valid msgpack envelope.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A value could not be encoded as msgpack.
    #[error("failed to encode payload: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
