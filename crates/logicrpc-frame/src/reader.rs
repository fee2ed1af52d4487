use std::io::ErrorKind;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::Decoder;

use crate::codec::{Frame, FrameConfig, RpcCodec};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `AsyncRead` stream.
///
/// Handles partial reads internally, so callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    codec: RpcCodec,
}

impl<T: AsyncRead + Unpin> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            codec: RpcCodec::new(config),
        }
    }

    /// Read the next complete frame.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached, whether
    /// cleanly between frames or in the middle of one.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buf)? {
                return Ok(frame);
            }

            self.buf.reserve(READ_CHUNK_SIZE);
            let read = match self.inner.read_buf(&mut self.buf).await {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use bytes::{BufMut, BytesMut};
    use tokio::io::ReadBuf;

    use super::*;
    use crate::codec::encode_frame;

    #[tokio::test]
    async fn read_single_frame() {
        let mut wire = BytesMut::new();
        encode_frame(1, b"hello", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().await.unwrap();

        assert_eq!(frame.correlation_id, 1);
        assert_eq!(frame.payload.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn read_multiple_frames() {
        let mut wire = BytesMut::new();
        encode_frame(1, b"one", &mut wire).unwrap();
        encode_frame(2, b"two", &mut wire).unwrap();
        encode_frame(3, b"three", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));

        let f1 = reader.read_frame().await.unwrap();
        let f2 = reader.read_frame().await.unwrap();
        let f3 = reader.read_frame().await.unwrap();

        assert_eq!((f1.correlation_id, f1.payload.as_ref()), (1, b"one".as_ref()));
        assert_eq!((f2.correlation_id, f2.payload.as_ref()), (2, b"two".as_ref()));
        assert_eq!(
            (f3.correlation_id, f3.payload.as_ref()),
            (3, b"three".as_ref())
        );
    }

    #[tokio::test]
    async fn read_frame_with_large_payload() {
        let payload = vec![0xAB; 64 * 1024];
        let mut wire = BytesMut::new();
        encode_frame(9, &payload, &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().await.unwrap();

        assert_eq!(frame.correlation_id, 9);
        assert_eq!(frame.payload.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn partial_read_handling() {
        let mut wire = BytesMut::new();
        encode_frame(4, b"slow", &mut wire).unwrap();

        let mut reader = FrameReader::new(ByteByByteReader {
            bytes: wire.to_vec(),
            pos: 0,
        });

        let frame = reader.read_frame().await.unwrap();
        assert_eq!(frame.correlation_id, 4);
        assert_eq!(frame.payload.as_ref(), b"slow");
    }

    #[tokio::test]
    async fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[tokio::test]
    async fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        partial.put_u32(2);
        partial.put_u32(16);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[tokio::test]
    async fn connection_closed_mid_header() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x00, 0x00, 0x00, 0x01, 0x00]));
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[tokio::test]
    async fn oversized_frame_in_stream() {
        let mut wire = BytesMut::new();
        wire.put_u32(1);
        wire.put_u32(1024);

        let cfg = FrameConfig {
            max_payload_size: 16,
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire.to_vec()), cfg);
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn roundtrip_over_duplex() {
        let (left, right) = tokio::io::duplex(1024);
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        writer.send(42, b"ping").await.unwrap();
        let frame = reader.read_frame().await.unwrap();

        assert_eq!(frame.correlation_id, 42);
        assert_eq!(frame.payload.as_ref(), b"ping");
    }

    #[tokio::test]
    async fn roundtrip_over_unix_pair() {
        let (left, right) = tokio::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let producer = tokio::spawn(async move {
            for i in 0..64u32 {
                writer.send(i, format!("msg-{i}").as_bytes()).await.unwrap();
            }
        });

        for expected in 0..64u32 {
            let frame = reader.read_frame().await.unwrap();
            assert_eq!(frame.correlation_id, expected);
            assert_eq!(frame.payload.as_ref(), format!("msg-{expected}").as_bytes());
        }

        producer.await.unwrap();
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[tokio::test]
    async fn interrupted_read_retries() {
        let mut wire = BytesMut::new();
        encode_frame(8, b"ok", &mut wire).unwrap();

        let mut framed = FrameReader::new(InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire.to_vec()),
        });
        let frame = framed.read_frame().await.unwrap();

        assert_eq!(frame.correlation_id, 8);
        assert_eq!(frame.payload.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn io_error_propagates() {
        let mut framed = FrameReader::new(BrokenReader);
        let err = framed.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::ConnectionReset));
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl AsyncRead for ByteByByteReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.pos < self.bytes.len() && buf.remaining() > 0 {
                let byte = self.bytes[self.pos];
                buf.put_slice(&[byte]);
                self.pos += 1;
            }
            Poll::Ready(Ok(()))
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl AsyncRead for InterruptedThenData {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if !self.interrupted {
                self.interrupted = true;
                return Poll::Ready(Err(std::io::Error::from(ErrorKind::Interrupted)));
            }
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    struct BrokenReader;

    impl AsyncRead for BrokenReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::from(ErrorKind::ConnectionReset)))
        }
    }
}
