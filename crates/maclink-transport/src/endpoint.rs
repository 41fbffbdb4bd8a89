use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, TransportError};

/// Scheme prefix for local socket endpoints.
pub const IPC_SCHEME: &str = "ipc://";

/// A bus endpoint address.
///
/// Accepts either `ipc:///tmp/ml_cmd` or a bare filesystem path
/// (`/tmp/ml_cmd`). Other schemes are rejected at parse time so that a
/// misconfigured address fails before any socket is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    path: PathBuf,
}

impl Endpoint {
    /// Build an endpoint from a socket path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse an endpoint string.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TransportError::InvalidEndpoint {
                endpoint: input.to_string(),
                reason: "endpoint is empty",
            });
        }

        let path = match trimmed.strip_prefix(IPC_SCHEME) {
            Some(rest) => rest,
            None => {
                if let Some((scheme, _)) = trimmed.split_once("://") {
                    return Err(TransportError::UnsupportedScheme {
                        scheme: scheme.to_string(),
                    });
                }
                trimmed
            }
        };

        if path.is_empty() {
            return Err(TransportError::InvalidEndpoint {
                endpoint: input.to_string(),
                reason: "missing socket path",
            });
        }
        if path.contains('\0') {
            return Err(TransportError::InvalidEndpoint {
                endpoint: input.to_string(),
                reason: "socket path contains a NUL byte",
            });
        }

        Ok(Self {
            path: PathBuf::from(path),
        })
    }

    /// Filesystem path of the socket.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{IPC_SCHEME}{}", self.path.display())
    }
}

impl AsRef<Path> for Endpoint {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}
