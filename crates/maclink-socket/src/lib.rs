//! Socket roles for the maclink bus.
//!
//! Two independent protocols run over framed local-socket connections:
//!
//! - command/reply: [`CommandClient`] sends one request and blocks for one
//!   reply; [`CommandServer`] answers them. [`CommandQueue`] shares one
//!   client between threads.
//! - publish/subscribe: [`Publisher`] fans messages out to every connected
//!   [`NotificationListener`], which filters by topic prefix and probes idle
//!   connections with keepalive pings.

pub mod cancel;
pub mod config;
mod connection;
pub mod control;
pub mod error;
pub mod publish;
pub mod queue;
pub mod reply;
pub mod request;
pub mod subscribe;

#[cfg(test)]
mod test_support;

pub use cancel::CancelToken;
pub use config::{
    ClientConfig, FailurePolicy, KeepaliveConfig, ListenerConfig, PublisherConfig, ServerConfig,
    DEFAULT_COMMAND_ENDPOINT, DEFAULT_NOTIFY_ENDPOINT,
};
pub use control::{ControlMessage, CONTROL_PING, CONTROL_PONG};
pub use error::{Result, SocketError};
pub use maclink_frame::Message;
pub use maclink_transport::Endpoint;
pub use publish::Publisher;
pub use queue::{CommandHandle, CommandQueue};
pub use reply::CommandServer;
pub use request::CommandClient;
pub use subscribe::{ListenerHandle, NotificationListener, NotificationObserver};
