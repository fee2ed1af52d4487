//! Wire codec for the logic RPC protocol.
//!
//! Every message on the socket is one frame:
//! - A 4-byte big-endian correlation ID
//! - A 4-byte big-endian payload length
//! - The payload: one msgpack-encoded envelope
//!
//! Requests travel as [`CallRequest`] envelopes, replies as [`CallResponse`].
//! The correlation ID is echoed by the backend so many calls can share one
//! connection. No partial reads, no buffer management in user code.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod reader;
pub mod value;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, RpcCodec, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use envelope::{decode_payload, encode_payload, CallRequest, CallResponse, Payload};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use value::{from_json, to_json};
pub use writer::FrameWriter;
