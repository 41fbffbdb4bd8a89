//! Client library for the maclink speech-command bus.
//!
//! A speech recognizer service exposes two local endpoints: a command/reply
//! endpoint that loads grammars and sets word lists, and a publisher that
//! broadcasts recognition events (`p.begin`, `p.hypothesis`, `p.end`).
//!
//! # Crate Structure
//!
//! - [`transport`]: Local socket transport and `ipc://` endpoints
//! - [`frame`]: Multipart message framing
//! - [`socket`]: Command client/server, publisher and notification listener
//! - [`grammar`]: Typed grammar commands (behind `grammar` feature)

/// Re-export transport types.
pub mod transport {
    pub use maclink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use maclink_frame::*;
}

/// Re-export socket roles.
pub mod socket {
    pub use maclink_socket::*;
}

/// Re-export grammar commands (requires `grammar` feature).
#[cfg(feature = "grammar")]
pub mod grammar {
    pub use maclink_grammar::*;
}
