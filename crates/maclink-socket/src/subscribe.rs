//! Subscribe side of the notification bus.

use std::thread::{self, JoinHandle};
use std::time::Instant;

use maclink_frame::{FrameConfig, Message, MessageAssembler};
use maclink_transport::Endpoint;
use tracing::{debug, error, info, trace, warn};

use crate::cancel::CancelToken;
use crate::config::{FailurePolicy, KeepaliveConfig, ListenerConfig};
use crate::connection::Connection;
use crate::control::ControlMessage;
use crate::error::{Result, SocketError};

/// Receives notifications from a [`NotificationListener`].
pub trait NotificationObserver {
    /// Handle one message. Returning an error stops the listener.
    fn on_message(&mut self, message: &Message) -> Result<()>;
}

impl<F> NotificationObserver for F
where
    F: FnMut(&Message) -> Result<()>,
{
    fn on_message(&mut self, message: &Message) -> Result<()> {
        self(message)
    }
}

struct Subscription {
    conn: Connection,
    assembler: MessageAssembler,
    probe: ProbeState,
}

/// Keepalive bookkeeping for one connection.
#[derive(Debug)]
struct ProbeState {
    last_activity: Instant,
    last_probe: Option<Instant>,
    sent: u32,
    seq: u64,
}

impl ProbeState {
    fn new() -> Self {
        Self {
            last_activity: Instant::now(),
            last_probe: None,
            sent: 0,
            seq: 0,
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
        self.last_probe = None;
        self.sent = 0;
    }

    /// Decide the next keepalive step after a quiet poll.
    fn next(&mut self, keepalive: &KeepaliveConfig, now: Instant) -> Probe {
        let due = match self.last_probe {
            None => now.duration_since(self.last_activity) >= keepalive.idle,
            Some(sent_at) => now.duration_since(sent_at) >= keepalive.interval,
        };
        if !due {
            return Probe::Wait;
        }
        if self.sent >= keepalive.probes {
            return Probe::Expired;
        }
        self.sent += 1;
        self.seq += 1;
        self.last_probe = Some(now);
        Probe::Send(self.seq)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Probe {
    Wait,
    Send(u64),
    Expired,
}

/// Subscriber connection to a notification publisher.
///
/// Receives whole messages, filters them by topic prefix, and keeps an idle
/// connection honest with ping probes. Blocking receives wake every
/// `poll_interval` to check cancellation.
pub struct NotificationListener {
    config: ListenerConfig,
    cancel: CancelToken,
    sub: Option<Subscription>,
}

impl NotificationListener {
    pub fn new(config: ListenerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelToken::new(),
            sub: None,
        })
    }

    /// Create and connect eagerly.
    pub fn connect(config: ListenerConfig) -> Result<Self> {
        let mut listener = Self::new(config)?;
        listener.open()?;
        Ok(listener)
    }

    /// Share an existing cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.config.endpoint
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.sub.is_some()
    }

    pub fn open(&mut self) -> Result<()> {
        self.ensure_open().map(|_| ())
    }

    pub fn close(&mut self) {
        if let Some(sub) = self.sub.take() {
            sub.conn.shutdown();
            debug!(endpoint = %self.config.endpoint, "subscription closed");
        }
    }

    /// Block for the next message that passes the topic filter.
    ///
    /// Fails with [`SocketError::Cancelled`] once the token is cancelled.
    /// Any other failure drops the connection; the next call reconnects.
    pub fn recv(&mut self) -> Result<Message> {
        match self.recv_inner() {
            Ok(message) => Ok(message),
            Err(err) => {
                if !matches!(err, SocketError::Cancelled) {
                    self.close();
                }
                Err(err)
            }
        }
    }

    /// Same as [`NotificationListener::recv`].
    pub fn next_message(&mut self) -> Result<Message> {
        self.recv()
    }

    fn recv_inner(&mut self) -> Result<Message> {
        let keepalive = self.config.keepalive;
        loop {
            if self.cancel.is_cancelled() {
                return Err(SocketError::Cancelled);
            }

            let sub = open_subscription(&mut self.sub, &self.config)?;
            let received = sub.assembler.receive(&mut sub.conn.reader);
            if !sub.conn.reader.take_control_frames().is_empty() {
                trace!("control traffic from publisher");
                sub.probe.touch();
            }

            match received {
                Ok(message) => {
                    sub.probe.touch();
                    if self.config.matches_topic(message.first()) {
                        trace!(frames = message.len(), "notification received");
                        return Ok(message);
                    }
                    trace!("notification filtered by topic");
                }
                Err(err) if err.is_timeout() => {
                    if let Some(keepalive) = &keepalive {
                        match sub.probe.next(keepalive, Instant::now()) {
                            Probe::Wait => {}
                            Probe::Send(seq) => {
                                trace!(seq, "sending keepalive probe");
                                let ping = ControlMessage::ping(seq).encode()?;
                                sub.conn.writer.send_control(&ping)?;
                            }
                            Probe::Expired => {
                                return Err(SocketError::KeepaliveExpired {
                                    endpoint: self.config.endpoint.to_string(),
                                    probes: keepalive.probes,
                                });
                            }
                        }
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Forward every message to `observer` until cancelled or a failure
    /// ends the loop under the configured [`FailurePolicy`].
    ///
    /// Returns `Ok(())` on cancellation. Observer errors always end the loop.
    pub fn run<O: NotificationObserver + ?Sized>(&mut self, observer: &mut O) -> Result<()> {
        info!(endpoint = %self.config.endpoint, "listening for notifications");
        loop {
            match self.recv() {
                Ok(message) => observer.on_message(&message)?,
                Err(SocketError::Cancelled) => {
                    info!(endpoint = %self.config.endpoint, "listener cancelled");
                    self.close();
                    return Ok(());
                }
                Err(err) => match self.config.failure_policy {
                    FailurePolicy::Terminate => {
                        error!(
                            endpoint = %self.config.endpoint,
                            error = %err,
                            "notification receive failed; stopping listener"
                        );
                        return Err(err);
                    }
                    FailurePolicy::Reconnect { delay } => {
                        warn!(
                            endpoint = %self.config.endpoint,
                            error = %err,
                            delay_ms = delay.as_millis() as u64,
                            "notification receive failed; reconnecting"
                        );
                        if self.cancel.wait(delay) {
                            info!(endpoint = %self.config.endpoint, "listener cancelled");
                            return Ok(());
                        }
                    }
                },
            }
        }
    }

    /// Run the loop on a dedicated thread.
    pub fn spawn<O>(mut self, mut observer: O) -> Result<ListenerHandle>
    where
        O: NotificationObserver + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let thread = thread::Builder::new()
            .name("maclink-listener".to_string())
            .spawn(move || self.run(&mut observer))
            .map_err(|err| SocketError::Worker(err.to_string()))?;
        Ok(ListenerHandle { cancel, thread })
    }

    fn ensure_open(&mut self) -> Result<&mut Subscription> {
        open_subscription(&mut self.sub, &self.config)
    }
}

fn open_subscription<'a>(
    slot: &'a mut Option<Subscription>,
    config: &ListenerConfig,
) -> Result<&'a mut Subscription> {
    let sub = match slot.take() {
        Some(sub) => sub,
        None => {
            let frame_config = FrameConfig {
                read_timeout: Some(config.poll_interval),
                ..config.frame.clone()
            };
            Subscription {
                conn: Connection::connect(&config.endpoint, frame_config)?,
                assembler: MessageAssembler::default(),
                probe: ProbeState::new(),
            }
        }
    };
    Ok(slot.insert(sub))
}

/// Handle to a listener running on its own thread.
pub struct ListenerHandle {
    cancel: CancelToken,
    thread: JoinHandle<Result<()>>,
}

impl ListenerHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the loop to end and return its result.
    pub fn join(self) -> Result<()> {
        self.thread
            .join()
            .map_err(|_| SocketError::Worker("listener thread panicked".to_string()))?
    }
}
