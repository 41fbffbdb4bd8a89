//! Local socket transport for the maclink bus.
//!
//! Provides endpoint addressing (`ipc:///path/to/socket`) and blocking
//! Unix domain socket streams. Everything else builds on top of the
//! [`IpcStream`] type provided here.

#![cfg(unix)]

pub mod endpoint;
pub mod error;
pub mod stream;
pub mod uds;

pub use endpoint::{Endpoint, IPC_SCHEME};
pub use error::{Result, TransportError};
pub use stream::IpcStream;
pub use uds::UnixDomainSocket;
