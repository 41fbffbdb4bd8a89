//! Multipart message framing for the maclink bus.
//!
//! Every frame on the stream is prefixed with:
//! - A 2-byte magic number ("ML") for stream synchronization
//! - A flags byte (MORE, CONTROL) and a reserved zero byte
//! - A 4-byte little-endian payload length
//!
//! A [`Message`] is one or more data frames, all but the last flagged MORE.
//! Control frames carry keepalive traffic and never appear inside a message.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, FrameKind, DEFAULT_MAX_PAYLOAD, FLAG_CONTROL,
    FLAG_MORE, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use message::{
    receive_message, send_message, FrameSink, FrameSource, Message, MessageAssembler,
};
pub use reader::FrameReader;
pub use writer::FrameWriter;
