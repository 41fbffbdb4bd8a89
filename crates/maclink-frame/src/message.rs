//! Multipart messages and the receive/send contract over frame connections.

use bytes::Bytes;

use crate::error::{FrameError, Result};

/// An ordered sequence of one or more frames, delivered as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    frames: Vec<Bytes>,
}

impl Message {
    /// Build a message from its frames. Fails if `frames` is empty.
    pub fn new(frames: Vec<Bytes>) -> Result<Self> {
        if frames.is_empty() {
            return Err(FrameError::EmptyMessage);
        }
        Ok(Self { frames })
    }

    /// A one-frame message.
    pub fn single(payload: impl Into<Bytes>) -> Self {
        Self {
            frames: vec![payload.into()],
        }
    }

    /// Build a message from anything that yields frame payloads.
    pub fn from_parts<I, B>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self::new(parts.into_iter().map(Into::into).collect())
    }

    /// All frames, in order.
    pub fn frames(&self) -> &[Bytes] {
        &self.frames
    }

    /// Number of frames (always at least one).
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; present for API symmetry with collections.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The first frame. Pub/sub traffic uses it as the topic.
    pub fn first(&self) -> &Bytes {
        &self.frames[0]
    }

    /// Total payload bytes across all frames.
    pub fn payload_size(&self) -> usize {
        self.frames.iter().map(Bytes::len).sum()
    }

    /// Consume the message and return its frames.
    pub fn into_frames(self) -> Vec<Bytes> {
        self.frames
    }

    /// Append a frame.
    pub fn push(&mut self, frame: impl Into<Bytes>) {
        self.frames.push(frame.into());
    }
}

impl From<Bytes> for Message {
    fn from(payload: Bytes) -> Self {
        Self::single(payload)
    }
}

/// A connection that hands out data frames one at a time.
///
/// Mirrors the two primitives a multipart socket exposes: receive one frame,
/// and report whether more frames of the same message follow immediately.
pub trait FrameSource {
    /// Receive the next data frame (blocking).
    fn recv_frame(&mut self) -> Result<Bytes>;

    /// Whether the frame last returned by [`FrameSource::recv_frame`] is
    /// followed by another frame of the same message.
    fn has_more(&self) -> bool;
}

/// A connection that accepts data frames one at a time.
pub trait FrameSink {
    /// Send one data frame; `more` marks that another frame of the same
    /// message follows.
    fn send_frame(&mut self, payload: &[u8], more: bool) -> Result<()>;
}

/// Receive one complete message.
///
/// Either the whole frame sequence is returned or the error from the first
/// failing receive is propagated; frames are never returned partially.
pub fn receive_message<S: FrameSource + ?Sized>(conn: &mut S) -> Result<Message> {
    MessageAssembler::default().receive(conn)
}

/// Send one message, flagging every frame but the last with MORE.
pub fn send_message<S: FrameSink + ?Sized>(conn: &mut S, message: &Message) -> Result<()> {
    let last = message.frames.len() - 1;
    for (index, frame) in message.frames.iter().enumerate() {
        conn.send_frame(frame.as_ref(), index < last)?;
    }
    Ok(())
}

/// Resumable message receive.
///
/// Frames collected before a failed receive are kept, so a caller polling a
/// connection with a read timeout can call [`MessageAssembler::receive`]
/// again after the timeout and pick up where it left off.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    frames: Vec<Bytes>,
}

impl MessageAssembler {
    /// Continue receiving until the current message is complete.
    pub fn receive<S: FrameSource + ?Sized>(&mut self, conn: &mut S) -> Result<Message> {
        loop {
            let frame = conn.recv_frame()?;
            self.frames.push(frame);
            if !conn.has_more() {
                return Ok(Message {
                    frames: std::mem::take(&mut self.frames),
                });
            }
        }
    }

    /// Whether a message is partially received.
    pub fn in_progress(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Drop any partially received frames.
    pub fn reset(&mut self) {
        self.frames.clear();
    }
}
