/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x4D4C \"ML\")")]
    InvalidMagic,

    /// The frame header carries flag bits this codec does not know.
    #[error("invalid frame flags {0:#04x}")]
    InvalidFlags(u8),

    /// The reserved header byte is not zero.
    #[error("reserved header byte must be zero (got {0:#04x})")]
    NonZeroReserved(u8),

    /// A control frame claimed to continue a message.
    #[error("control frame must not carry the MORE flag")]
    ControlWithMore,

    /// A control frame arrived between the frames of one message.
    #[error("control frame interleaved with a multipart message")]
    ControlInMessage,

    /// A message must hold at least one frame.
    #[error("message has no frames")]
    EmptyMessage,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors caused by the byte stream violating the framing rules.
    pub fn is_protocol(&self) -> bool {
        !matches!(self, FrameError::Io(_) | FrameError::ConnectionClosed)
    }

    /// True when a blocking read or write gave up because its timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
