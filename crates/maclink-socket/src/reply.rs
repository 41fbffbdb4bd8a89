//! Service side of the command/reply protocol.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use maclink_frame::{send_message, FrameError, Message, MessageAssembler};
use maclink_transport::{Endpoint, IpcStream, UnixDomainSocket};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::control::ControlMessage;
use crate::error::{Result, SocketError};

/// Accepts command clients and answers each request through a handler.
///
/// Every connection is served on its own thread. The handler's return value
/// is sent back as a single-frame reply.
pub struct CommandServer {
    socket: UnixDomainSocket,
    endpoint: Endpoint,
    config: ServerConfig,
    cancel: CancelToken,
}

impl CommandServer {
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        Self::bind_with_config(endpoint, ServerConfig::default())
    }

    pub fn bind_with_config(endpoint: &Endpoint, config: ServerConfig) -> Result<Self> {
        let socket = UnixDomainSocket::bind_endpoint(endpoint)?;
        info!(endpoint = %endpoint, "command server listening");
        Ok(Self {
            socket,
            endpoint: endpoint.clone(),
            config,
            cancel: CancelToken::new(),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Token that stops [`CommandServer::serve`] when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Serve until cancelled. Returns once every connection thread has exited.
    pub fn serve<H>(&self, handler: H) -> Result<()>
    where
        H: Fn(&Message) -> Bytes + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let mut connections: Vec<JoinHandle<()>> = Vec::new();

        while !self.cancel.is_cancelled() {
            let Some(stream) = self.socket.try_accept()? else {
                self.cancel.wait(self.config.poll_interval);
                continue;
            };

            connections.retain(|conn| !conn.is_finished());
            let handler = Arc::clone(&handler);
            let cancel = self.cancel.clone();
            let config = self.config.clone();
            let spawned = thread::Builder::new()
                .name("maclink-reply".to_string())
                .spawn(move || {
                    if let Err(err) = serve_connection(stream, &config, &cancel, handler.as_ref())
                    {
                        warn!(error = %err, "command connection failed");
                    }
                })
                .map_err(|err| SocketError::Worker(err.to_string()))?;
            connections.push(spawned);
        }

        for conn in connections {
            let _ = conn.join();
        }
        info!(endpoint = %self.endpoint, "command server stopped");
        Ok(())
    }
}

fn serve_connection<H>(
    stream: IpcStream,
    config: &ServerConfig,
    cancel: &CancelToken,
    handler: &H,
) -> Result<()>
where
    H: Fn(&Message) -> Bytes + ?Sized,
{
    let frame_config = maclink_frame::FrameConfig {
        read_timeout: Some(config.poll_interval),
        ..config.frame.clone()
    };
    let mut conn = Connection::from_stream(stream, frame_config)?;
    let mut assembler = MessageAssembler::default();
    debug!("command client connected");

    while !cancel.is_cancelled() {
        let received = assembler.receive(&mut conn.reader);
        answer_pings(&mut conn)?;
        match received {
            Ok(request) => {
                debug!(
                    frames = request.len(),
                    size = request.payload_size(),
                    "request received"
                );
                let reply = Message::single(handler(&request));
                send_message(&mut conn.writer, &reply)?;
            }
            Err(err) if err.is_timeout() => continue,
            Err(FrameError::ConnectionClosed) => {
                debug!("command client disconnected");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
    }

    conn.shutdown();
    Ok(())
}

fn answer_pings(conn: &mut Connection) -> Result<()> {
    for payload in conn.reader.take_control_frames() {
        let control = ControlMessage::decode(&payload)?;
        if control.is_ping() {
            conn.writer
                .send_control(&ControlMessage::pong_for(&control).encode()?)?;
        }
    }
    Ok(())
}
