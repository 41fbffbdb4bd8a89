//! Publish side of the notification bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use maclink_frame::{
    send_message, FrameConfig, FrameError, FrameKind, FrameReader, FrameWriter, Message,
};
use maclink_transport::{Endpoint, IpcStream, UnixDomainSocket};
use tracing::{debug, info, trace, warn};

use crate::cancel::CancelToken;
use crate::config::PublisherConfig;
use crate::control::ControlMessage;
use crate::error::{Result, SocketError};

type SharedWriter = Arc<Mutex<FrameWriter<IpcStream>>>;

struct Subscriber {
    id: u64,
    writer: SharedWriter,
}

struct Shared {
    subscribers: Mutex<Vec<Subscriber>>,
    readers: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU64,
    config: PublisherConfig,
}

impl Shared {
    fn remove(&self, id: u64) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sub| sub.id != id);
    }
}

/// Fans every published message out to all connected subscribers.
///
/// Publishing never waits for subscribers to appear; with nobody connected a
/// message is discarded. A subscriber whose connection fails or stays full
/// past the send timeout is dropped.
pub struct Publisher {
    shared: Arc<Shared>,
    endpoint: Endpoint,
    cancel: CancelToken,
    accept_thread: Option<JoinHandle<()>>,
}

impl Publisher {
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        Self::bind_with_config(endpoint, PublisherConfig::default())
    }

    pub fn bind_with_config(endpoint: &Endpoint, config: PublisherConfig) -> Result<Self> {
        let socket = UnixDomainSocket::bind_endpoint(endpoint)?;
        info!(endpoint = %endpoint, "publisher listening");

        let shared = Arc::new(Shared {
            subscribers: Mutex::new(Vec::new()),
            readers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            config,
        });
        let cancel = CancelToken::new();

        let accept_shared = Arc::clone(&shared);
        let accept_cancel = cancel.clone();
        let accept_thread = thread::Builder::new()
            .name("maclink-pub-accept".to_string())
            .spawn(move || accept_loop(socket, accept_shared, accept_cancel))
            .map_err(|err| SocketError::Worker(err.to_string()))?;

        Ok(Self {
            shared,
            endpoint: endpoint.clone(),
            cancel,
            accept_thread: Some(accept_thread),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Send `message` to every current subscriber. Returns how many took it.
    ///
    /// Writes happen outside the subscriber list lock, so a subscriber that
    /// stalls until the send timeout holds up this call but not registration,
    /// removal or counting.
    pub fn publish(&self, message: &Message) -> usize {
        let targets: Vec<(u64, SharedWriter)> = self
            .shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|sub| (sub.id, Arc::clone(&sub.writer)))
            .collect();

        let mut delivered = 0;
        for (id, writer) in targets {
            let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
            match send_message(&mut *writer, message) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(subscriber = id, error = %err, "dropping subscriber");
                    let _ = writer.get_ref().shutdown();
                    drop(writer);
                    self.shared.remove(id);
                }
            }
        }

        trace!(
            frames = message.len(),
            subscribers = delivered,
            "message published"
        );
        delivered
    }

    /// Publish the two-frame `[topic, body]` form.
    pub fn publish_topic(&self, topic: &str, body: impl Into<Bytes>) -> usize {
        let message = Message::from_parts([Bytes::copy_from_slice(topic.as_bytes()), body.into()]);
        match message {
            Ok(message) => self.publish(&message),
            Err(_) => 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Block until at least `count` subscribers are connected or `timeout` passes.
    pub fn wait_for_subscribers(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.subscriber_count() >= count {
                return true;
            }
            if Instant::now() >= deadline || self.cancel.wait(Duration::from_millis(10)) {
                return false;
            }
        }
    }

    /// Stop accepting, disconnect every subscriber and wait for helper threads.
    pub fn close(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(accept_thread) = self.accept_thread.take() else {
            return;
        };
        self.cancel.cancel();
        let _ = accept_thread.join();

        let subscribers = std::mem::take(
            &mut *self
                .shared
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for sub in subscribers {
            let writer = sub.writer.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = writer.get_ref().shutdown();
        }

        let readers = std::mem::take(
            &mut *self
                .shared
                .readers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for reader in readers {
            let _ = reader.join();
        }
        info!(endpoint = %self.endpoint, "publisher stopped");
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(socket: UnixDomainSocket, shared: Arc<Shared>, cancel: CancelToken) {
    while !cancel.is_cancelled() {
        match socket.try_accept() {
            Ok(Some(stream)) => {
                if let Err(err) = register(stream, &shared) {
                    warn!(error = %err, "failed to register subscriber");
                }
            }
            Ok(None) => {
                cancel.wait(shared.config.poll_interval);
            }
            Err(err) => {
                warn!(error = %err, "subscriber accept failed");
                cancel.wait(shared.config.poll_interval);
            }
        }
    }
}

fn register(stream: IpcStream, shared: &Arc<Shared>) -> Result<()> {
    let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
    let frame_config = FrameConfig {
        max_payload_size: shared.config.max_payload_size,
        read_timeout: None,
        write_timeout: Some(shared.config.send_timeout),
    };

    let reader = FrameReader::with_config_ipc(stream.try_clone()?, frame_config.clone())?;
    let writer: SharedWriter = Arc::new(Mutex::new(FrameWriter::with_config_ipc(
        stream,
        frame_config,
    )?));

    let reader_shared = Arc::clone(shared);
    let reader_writer = Arc::clone(&writer);
    let handle = thread::Builder::new()
        .name(format!("maclink-pub-sub-{id}"))
        .spawn(move || subscriber_reader(id, reader, reader_writer, reader_shared))
        .map_err(|err| SocketError::Worker(err.to_string()))?;

    {
        let mut readers = shared.readers.lock().unwrap_or_else(PoisonError::into_inner);
        readers.retain(|reader| !reader.is_finished());
        readers.push(handle);
    }
    shared
        .subscribers
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(Subscriber { id, writer });
    debug!(subscriber = id, "subscriber connected");
    Ok(())
}

/// Answer keepalive probes until the subscriber goes away.
fn subscriber_reader(
    id: u64,
    mut reader: FrameReader<IpcStream>,
    writer: SharedWriter,
    shared: Arc<Shared>,
) {
    loop {
        match reader.read_frame() {
            Ok(frame) if frame.kind == FrameKind::Control => {
                if let Err(err) = answer_probe(&frame.payload, &writer) {
                    debug!(subscriber = id, error = %err, "keepalive reply failed");
                    break;
                }
            }
            Ok(_) => trace!(subscriber = id, "ignoring data frame from subscriber"),
            Err(FrameError::ConnectionClosed) => {
                debug!(subscriber = id, "subscriber disconnected");
                break;
            }
            Err(err) => {
                debug!(subscriber = id, error = %err, "subscriber connection failed");
                break;
            }
        }
    }
    shared.remove(id);
}

fn answer_probe(payload: &[u8], writer: &SharedWriter) -> Result<()> {
    let control = ControlMessage::decode(payload)?;
    if control.is_ping() {
        let pong = ControlMessage::pong_for(&control).encode()?;
        writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send_control(&pong)?;
    }
    Ok(())
}
