use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use maclink_transport::IpcStream;
use tracing::trace;

use crate::codec::{decode_frame, Frame, FrameConfig, FrameKind};
use crate::error::{FrameError, Result};
use crate::message::FrameSource;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;
/// Control frames held for the owner before the oldest is dropped.
const MAX_PENDING_CONTROL: usize = 64;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// Bytes already buffered survive a read timeout, so a timed-out call can be
/// retried without losing data.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    more: bool,
    control: VecDeque<Bytes>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            more: false,
            control: VecDeque::new(),
        }
    }

    /// Read the next complete frame of any kind (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Take the control frames received since the last call, oldest first.
    pub fn take_control_frames(&mut self) -> Vec<Bytes> {
        self.control.drain(..).collect()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T: Read> FrameSource for FrameReader<T> {
    /// Control frames between messages are queued for
    /// [`FrameReader::take_control_frames`]; inside a message they are a
    /// protocol error.
    fn recv_frame(&mut self) -> Result<Bytes> {
        loop {
            let frame = self.read_frame()?;
            match frame.kind {
                FrameKind::Data => {
                    self.more = frame.more;
                    return Ok(frame.payload);
                }
                FrameKind::Control => {
                    if self.more {
                        return Err(FrameError::ControlInMessage);
                    }
                    if self.control.len() == MAX_PENDING_CONTROL {
                        trace!("control queue full; dropping oldest control frame");
                        self.control.pop_front();
                    }
                    self.control.push_back(frame.payload);
                }
            }
        }
    }

    fn has_more(&self) -> bool {
        self.more
    }
}

impl FrameReader<IpcStream> {
    /// Create a frame reader for `IpcStream` and apply read timeout from config.
    pub fn with_config_ipc(mut inner: IpcStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }

    /// Fail reads with a timeout once `deadline` passes, however the bytes
    /// arrive. `None` returns to the configured read timeout.
    pub fn set_read_deadline(&mut self, deadline: Option<std::time::Instant>) -> Result<()> {
        self.inner
            .set_read_deadline(deadline)
            .map_err(transport_to_frame_error)
    }
}

pub(crate) fn transport_to_frame_error(err: maclink_transport::TransportError) -> FrameError {
    match err {
        maclink_transport::TransportError::Io(io)
        | maclink_transport::TransportError::Accept(io) => FrameError::Io(io),
        maclink_transport::TransportError::Bind { source, .. }
        | maclink_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
