use std::time::Duration;

use maclink_frame::FrameError;
use maclink_transport::TransportError;

/// Errors surfaced by the socket roles.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    /// Transport-level error: refused, reset, unreachable.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The byte stream violated the framing rules.
    #[error("protocol error: {0}")]
    Protocol(FrameError),

    /// A reply arrived as more than one frame.
    #[error("protocol error: expected a single-frame reply, got {0} frames")]
    MultipartReply(usize),

    /// The request could not be serialized; nothing was sent.
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The peer closed the connection.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// Keepalive probes went unanswered.
    #[error("no keepalive response from {endpoint} after {probes} probes")]
    KeepaliveExpired { endpoint: String, probes: u32 },

    /// A blocking operation exceeded its configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The operation was cancelled through its cancel token.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A notification observer rejected a message.
    #[error("observer failed: {0}")]
    Observer(String),

    /// A background worker thread could not be started or panicked.
    #[error("worker thread failed: {0}")]
    Worker(String),
}

impl SocketError {
    /// Connection-level failures: the endpoint is gone or stopped answering.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SocketError::Transport(_)
                | SocketError::Disconnected(_)
                | SocketError::KeepaliveExpired { .. }
        )
    }

    /// Framing violations on the wire.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            SocketError::Protocol(_) | SocketError::MultipartReply(_)
        )
    }

    pub(crate) fn from_frame(err: FrameError, timeout: Option<Duration>) -> Self {
        if err.is_timeout() {
            if let Some(timeout) = timeout {
                return SocketError::Timeout(timeout);
            }
        }
        err.into()
    }
}

impl From<FrameError> for SocketError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(io) => SocketError::Transport(TransportError::Io(io)),
            FrameError::ConnectionClosed => {
                SocketError::Disconnected("connection closed by peer".to_string())
            }
            other => SocketError::Protocol(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SocketError>;

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use super::*;

    #[test]
    fn frame_errors_split_into_transport_and_protocol() {
        let reset: SocketError =
            FrameError::Io(std::io::Error::from(ErrorKind::ConnectionReset)).into();
        assert!(reset.is_transport());

        let closed: SocketError = FrameError::ConnectionClosed.into();
        assert!(matches!(closed, SocketError::Disconnected(_)));
        assert!(closed.is_transport());

        let magic: SocketError = FrameError::InvalidMagic.into();
        assert!(magic.is_protocol());
        assert!(!magic.is_transport());
    }

    #[test]
    fn timeouts_map_only_when_configured() {
        let timed_out = || FrameError::Io(std::io::Error::from(ErrorKind::WouldBlock));

        let err = SocketError::from_frame(timed_out(), Some(Duration::from_millis(50)));
        assert!(matches!(err, SocketError::Timeout(d) if d == Duration::from_millis(50)));

        let err = SocketError::from_frame(timed_out(), None);
        assert!(err.is_transport());
    }
}
