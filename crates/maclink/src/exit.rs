use std::fmt;
use std::io;

use maclink_grammar::GrammarError;
use maclink_socket::SocketError;
use maclink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint { .. } | TransportError::UnsupportedScheme { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn socket_error(context: &str, err: SocketError) -> CliError {
    match err {
        SocketError::Transport(err) => transport_error(context, err),
        SocketError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SocketError::Disconnected(_) | SocketError::KeepaliveExpired { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        SocketError::Protocol(_) | SocketError::MultipartReply(_) | SocketError::Encoding(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        SocketError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        SocketError::Cancelled | SocketError::Observer(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        SocketError::Worker(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn grammar_error(context: &str, err: GrammarError) -> CliError {
    match err {
        GrammarError::LoadFailed(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn socket_errors_map_to_exit_codes() {
        let refused = SocketError::Transport(TransportError::Connect {
            path: "/tmp/ml_cmd".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        });
        assert_eq!(socket_error("call", refused).code, TRANSPORT_ERROR);

        let timeout = SocketError::Timeout(Duration::from_secs(1));
        assert_eq!(socket_error("call", timeout).code, TIMEOUT);

        let multipart = SocketError::MultipartReply(2);
        assert_eq!(socket_error("call", multipart).code, DATA_INVALID);
    }

    #[test]
    fn grammar_errors_are_invalid_data() {
        let err = grammar_error("load", GrammarError::NoPublicRules("g".into()));
        assert_eq!(err.code, DATA_INVALID);
        assert_eq!(err.to_string(), "load: grammar \"g\" has no public rules");
    }
}
