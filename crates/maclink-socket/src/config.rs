use std::time::Duration;

use bytes::Bytes;
use maclink_frame::FrameConfig;
use maclink_transport::Endpoint;

use crate::error::{Result, SocketError};

/// Default endpoint of the command/reply service.
pub const DEFAULT_COMMAND_ENDPOINT: &str = "ipc:///tmp/ml_cmd";
/// Default endpoint of the notification publisher.
pub const DEFAULT_NOTIFY_ENDPOINT: &str = "ipc:///tmp/ml_pub";

const DEFAULT_COMMAND_PATH: &str = "/tmp/ml_cmd";
const DEFAULT_NOTIFY_PATH: &str = "/tmp/ml_pub";

/// Command client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    /// Frame limits and the send timeout.
    pub frame: FrameConfig,
    /// Deadline for a whole reply, counted from the moment the request has
    /// been sent. `None` blocks indefinitely.
    pub reply_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::from_path(DEFAULT_COMMAND_PATH),
            frame: FrameConfig::default(),
            reply_timeout: None,
        }
    }
}

/// Liveness probing for an idle subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Silence before the first probe.
    pub idle: Duration,
    /// Silence between further probes.
    pub interval: Duration,
    /// Unanswered probes before the connection is declared dead.
    pub probes: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            idle: Duration::from_millis(3000),
            interval: Duration::from_millis(1000),
            probes: 3,
        }
    }
}

impl KeepaliveConfig {
    pub fn validate(&self) -> Result<()> {
        if self.idle.is_zero() || self.interval.is_zero() {
            return Err(SocketError::InvalidConfig(
                "keepalive idle and interval must be non-zero".to_string(),
            ));
        }
        if self.probes == 0 {
            return Err(SocketError::InvalidConfig(
                "keepalive probes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// What the notification loop does after a receive failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log and return the error.
    #[default]
    Terminate,
    /// Log, wait `delay`, reconnect and keep listening.
    Reconnect { delay: Duration },
}

/// Notification listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub endpoint: Endpoint,
    /// Prefix matched against the first frame of each message. Empty
    /// receives everything.
    pub topic: Bytes,
    /// `None` disables keepalive probing.
    pub keepalive: Option<KeepaliveConfig>,
    /// How often a blocked receive wakes to check cancellation and keepalive.
    pub poll_interval: Duration,
    pub failure_policy: FailurePolicy,
    pub frame: FrameConfig,
}

impl ListenerConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(SocketError::InvalidConfig(
                "poll interval must be non-zero".to_string(),
            ));
        }
        if let FailurePolicy::Reconnect { delay } = self.failure_policy {
            if delay.is_zero() {
                return Err(SocketError::InvalidConfig(
                    "reconnect delay must be non-zero".to_string(),
                ));
            }
        }
        match &self.keepalive {
            Some(keepalive) => keepalive.validate(),
            None => Ok(()),
        }
    }

    pub(crate) fn matches_topic(&self, first_frame: &[u8]) -> bool {
        first_frame.starts_with(&self.topic)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::from_path(DEFAULT_NOTIFY_PATH),
            topic: Bytes::new(),
            keepalive: Some(KeepaliveConfig::default()),
            poll_interval: Duration::from_millis(100),
            failure_policy: FailurePolicy::default(),
            frame: FrameConfig::default(),
        }
    }
}

/// Command server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How often the accept loop and connection readers check cancellation.
    pub poll_interval: Duration,
    pub frame: FrameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            frame: FrameConfig::default(),
        }
    }
}

/// Publisher configuration.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// A subscriber that cannot take a message within this time is dropped.
    pub send_timeout: Duration,
    /// How often the accept loop checks for shutdown.
    pub poll_interval: Duration,
    pub max_payload_size: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
            max_payload_size: maclink_frame::DEFAULT_MAX_PAYLOAD,
        }
    }
}
