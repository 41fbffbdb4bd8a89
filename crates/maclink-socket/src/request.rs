//! Command/reply client.

use std::time::Instant;

use bytes::Bytes;
use maclink_frame::{receive_message, send_message, Message};
use maclink_transport::Endpoint;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::{Result, SocketError};

/// Client side of the command/reply protocol.
///
/// Connects lazily on the first call. Each call sends one request and blocks
/// for exactly one reply; `&mut self` keeps requests and replies strictly
/// alternating. After any failure the connection is discarded and the next
/// call reconnects. Failed calls are never retried.
pub struct CommandClient {
    config: ClientConfig,
    conn: Option<Connection>,
}

impl CommandClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config, conn: None }
    }

    /// Client for `endpoint` with default settings. Does not connect.
    pub fn with_endpoint(endpoint: Endpoint) -> Self {
        Self::new(ClientConfig::new(endpoint))
    }

    /// Connect eagerly.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let mut client = Self::new(config);
        client.open()?;
        Ok(client)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.config.endpoint
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Establish the connection if it is not already open.
    pub fn open(&mut self) -> Result<()> {
        self.ensure_open().map(|_| ())
    }

    /// Drop the connection. A later call reconnects.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.shutdown();
            debug!(endpoint = %self.config.endpoint, "command connection closed");
        }
    }

    /// Serialize `request` as JSON, send it, and return the raw reply bytes.
    ///
    /// Serialization failures are reported before any I/O.
    pub fn call<T: Serialize + ?Sized>(&mut self, request: &T) -> Result<Bytes> {
        let payload = serde_json::to_vec(request)?;
        self.call_raw(&payload)
    }

    /// Send `payload` as a single-frame request and return the single-frame reply.
    pub fn call_raw(&mut self, payload: &[u8]) -> Result<Bytes> {
        let reply = self.call_message(&Message::single(Bytes::copy_from_slice(payload)))?;
        if reply.len() != 1 {
            return Err(SocketError::MultipartReply(reply.len()));
        }
        Ok(reply.first().clone())
    }

    /// Send one request message and return the reply message as received.
    ///
    /// With a `reply_timeout`, the whole reply must arrive within that time
    /// of the request being sent.
    pub fn call_message(&mut self, request: &Message) -> Result<Message> {
        let reply_timeout = self.config.reply_timeout;
        let send_timeout = self.config.frame.write_timeout;
        let conn = self.ensure_open()?;

        debug!(
            frames = request.len(),
            size = request.payload_size(),
            "sending request"
        );

        let outcome = send_message(&mut conn.writer, request)
            .map_err(|err| SocketError::from_frame(err, send_timeout))
            .and_then(|()| {
                let deadline = reply_timeout.map(|timeout| Instant::now() + timeout);
                conn.reader.set_read_deadline(deadline)?;
                let reply = receive_message(&mut conn.reader)
                    .map_err(|err| SocketError::from_frame(err, reply_timeout))?;
                conn.reader.set_read_deadline(None)?;
                Ok(reply)
            });

        match outcome {
            Ok(reply) => {
                debug!(
                    frames = reply.len(),
                    size = reply.payload_size(),
                    "reply received"
                );
                Ok(reply)
            }
            Err(err) => {
                warn!(
                    endpoint = %self.config.endpoint,
                    error = %err,
                    "command failed; discarding connection"
                );
                self.close();
                Err(err)
            }
        }
    }

    fn ensure_open(&mut self) -> Result<&mut Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => Connection::connect(&self.config.endpoint, self.config.frame.clone())?,
        };
        Ok(self.conn.insert(conn))
    }
}

impl std::fmt::Debug for CommandClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandClient")
            .field("endpoint", &self.config.endpoint)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::thread;
    use std::time::Duration;

    use maclink_frame::{FrameReader, FrameWriter};
    use maclink_transport::UnixDomainSocket;
    use serde_json::json;

    use super::*;
    use crate::test_support::{temp_socket, TempSocket};

    /// Accept `connections` clients in turn; answer each request with `reply(request)`.
    fn stub_server<F>(
        sock: &TempSocket,
        connections: usize,
        reply: F,
    ) -> thread::JoinHandle<()>
    where
        F: Fn(&Message) -> Option<Message> + Send + 'static,
    {
        let listener = UnixDomainSocket::bind(sock.path()).expect("bind");
        thread::spawn(move || {
            for _ in 0..connections {
                let stream = listener.accept().expect("accept");
                let mut reader = FrameReader::new(stream.try_clone().expect("clone"));
                let mut writer = FrameWriter::new(stream);
                while let Ok(request) = receive_message(&mut reader) {
                    match reply(&request) {
                        Some(response) => send_message(&mut writer, &response).expect("reply"),
                        None => break,
                    }
                }
            }
        })
    }

    #[test]
    fn ping_returns_ok() {
        let sock = temp_socket("req-ping");
        let server = stub_server(&sock, 1, |request| {
            assert_eq!(request.first().as_ref(), br#"{"cmd":"ping"}"#);
            Some(Message::single("OK"))
        });

        let mut client = CommandClient::with_endpoint(sock.endpoint());
        assert!(!client.is_open());
        let reply = client.call(&json!({ "cmd": "ping" })).expect("call");
        assert_eq!(reply.as_ref(), b"OK");
        assert!(client.is_open());

        client.close();
        server.join().unwrap();
    }

    #[test]
    fn unreachable_endpoint_is_transport_error() {
        let sock = temp_socket("req-unreachable");
        let mut client = CommandClient::with_endpoint(sock.endpoint());

        let err = client.call(&json!({ "cmd": "g.show" })).unwrap_err();
        assert!(err.is_transport(), "unexpected error: {err}");
        assert!(!client.is_open());
    }

    #[test]
    fn encoding_failure_happens_before_connecting() {
        use std::collections::HashMap;

        let sock = temp_socket("req-encode");
        let mut client = CommandClient::with_endpoint(sock.endpoint());

        // Non-string map keys cannot be encoded as JSON.
        let mut bad = HashMap::new();
        bad.insert((1, 2), "x");
        let err = client.call(&bad).unwrap_err();
        assert!(matches!(err, SocketError::Encoding(_)));
        assert!(!client.is_open());
    }

    #[test]
    fn sequential_calls_pair_with_their_replies() {
        for calls in [1usize, 10, 1000] {
            let sock = temp_socket("req-seq");
            let server = stub_server(&sock, 1, |request| Some(request.clone()));

            let mut client = CommandClient::with_endpoint(sock.endpoint());
            for i in 0..calls {
                let request = json!({ "cmd": "g.show", "seq": i });
                let reply = client.call(&request).expect("call");
                let echoed: serde_json::Value = serde_json::from_slice(&reply).unwrap();
                assert_eq!(echoed, request, "call {i} of {calls}");
            }

            client.close();
            server.join().unwrap();
        }
    }

    #[test]
    fn multipart_reply_is_protocol_error() {
        let sock = temp_socket("req-multipart");
        let server = stub_server(&sock, 1, |_| {
            Some(Message::from_parts(["part-1", "part-2"]).unwrap())
        });

        let mut client = CommandClient::with_endpoint(sock.endpoint());
        let err = client.call_raw(b"{}").unwrap_err();
        assert!(matches!(err, SocketError::MultipartReply(2)));
        assert!(err.is_protocol());

        client.close();
        server.join().unwrap();
    }

    #[test]
    fn call_message_returns_all_frames() {
        let sock = temp_socket("req-message");
        let server = stub_server(&sock, 1, |_| {
            Some(Message::from_parts(["a", "b", "c"]).unwrap())
        });

        let mut client = CommandClient::with_endpoint(sock.endpoint());
        let reply = client.call_message(&Message::single("{}")).expect("call");
        assert_eq!(reply.len(), 3);

        client.close();
        server.join().unwrap();
    }

    #[test]
    fn timeout_discards_connection_and_next_call_reconnects() {
        let sock = temp_socket("req-timeout");
        let listener = UnixDomainSocket::bind(sock.path()).expect("bind");
        let server = thread::spawn(move || {
            // First connection: swallow the request, never reply.
            let silent = listener.accept().expect("accept");
            let mut reader = FrameReader::new(silent.try_clone().unwrap());
            receive_message(&mut reader).expect("request");

            // Second connection: answer normally.
            let stream = listener.accept().expect("accept");
            let mut reader = FrameReader::new(stream.try_clone().unwrap());
            let mut writer = FrameWriter::new(stream);
            let request = receive_message(&mut reader).expect("request");
            send_message(&mut writer, &request).expect("reply");
            drop(silent);
        });

        let mut client = CommandClient::new(ClientConfig {
            reply_timeout: Some(Duration::from_millis(100)),
            ..ClientConfig::new(sock.endpoint())
        });

        let err = client.call_raw(b"first").unwrap_err();
        assert!(matches!(err, SocketError::Timeout(_)), "got {err}");
        assert!(!client.is_open());

        let reply = client.call_raw(b"second").expect("reconnected call");
        assert_eq!(reply.as_ref(), b"second");

        client.close();
        server.join().unwrap();
    }

    #[test]
    fn reply_timeout_covers_a_reply_sent_byte_by_byte() {
        use std::io::Write;

        let sock = temp_socket("req-trickle");
        let listener = UnixDomainSocket::bind(sock.path()).expect("bind");
        let server = thread::spawn(move || {
            let mut stream = listener.accept().expect("accept");
            let mut reader = FrameReader::new(stream.try_clone().unwrap());
            receive_message(&mut reader).expect("request");

            let mut encoded = bytes::BytesMut::new();
            maclink_frame::encode_frame(0, br#"{"success":true,"x":1}"#, &mut encoded).unwrap();
            // Each byte lands well inside the timeout; the reply as a whole does not.
            for byte in encoded.iter() {
                if stream.write_all(&[*byte]).is_err() {
                    break;
                }
                thread::sleep(Duration::from_millis(60));
            }
        });

        let mut client = CommandClient::new(ClientConfig {
            reply_timeout: Some(Duration::from_millis(200)),
            ..ClientConfig::new(sock.endpoint())
        });

        let started = std::time::Instant::now();
        let err = client.call_raw(b"slow").unwrap_err();
        assert!(matches!(err, SocketError::Timeout(_)), "got {err}");
        assert!(
            started.elapsed() < Duration::from_millis(800),
            "call took {:?}",
            started.elapsed()
        );
        assert!(!client.is_open());

        server.join().unwrap();
    }

    #[test]
    fn server_hangup_is_transport_error_then_reconnects() {
        let sock = temp_socket("req-hangup");
        // First connection: drop without replying. Second: echo.
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let server = stub_server(&sock, 2, move |request| {
            if calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                None
            } else {
                Some(request.clone())
            }
        });

        let mut client = CommandClient::with_endpoint(sock.endpoint());
        let err = client.call_raw(b"lost").unwrap_err();
        assert!(err.is_transport(), "got {err}");

        let reply = client.call_raw(b"again").expect("second call");
        assert_eq!(reply.as_ref(), b"again");

        client.close();
        server.join().unwrap();
    }
}
