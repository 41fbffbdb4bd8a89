use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use maclink_grammar::Reply;
use maclink_socket::{CommandServer, Message, Publisher};
use serde_json::Value;

use crate::cmd::{install_ctrlc_handler, ServeArgs};
use crate::exit::{socket_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::OutputFormat;

/// Topic under which accepted commands are republished.
const COMMAND_TOPIC: &str = "cmd";

pub fn run(args: ServeArgs, _format: OutputFormat) -> CliResult<i32> {
    let publisher =
        Publisher::bind(&args.pub_endpoint).map_err(|err| socket_error("bind failed", err))?;
    let server =
        CommandServer::bind(&args.cmd_endpoint).map_err(|err| socket_error("bind failed", err))?;
    install_ctrlc_handler(server.cancel_token())?;

    tracing::info!(
        cmd = %args.cmd_endpoint,
        notify = %args.pub_endpoint,
        "serving"
    );

    let republisher = Republisher::spawn(publisher)?;
    let commands = republisher.sender();
    let result = server.serve(move |request: &Message| {
        let (reply, accepted) = handle_request(request);
        if accepted && commands.send(request.first().clone()).is_err() {
            tracing::warn!("republisher gone; command not forwarded");
        }
        reply
    });
    republisher.finish();

    result.map_err(|err| socket_error("serve failed", err))?;
    Ok(SUCCESS)
}

/// Owns the publisher on its own thread so command replies never wait on a
/// slow subscriber.
struct Republisher {
    tx: mpsc::Sender<Bytes>,
    worker: JoinHandle<()>,
}

impl Republisher {
    fn spawn(publisher: Publisher) -> CliResult<Self> {
        let (tx, rx) = mpsc::channel::<Bytes>();
        let worker = thread::Builder::new()
            .name("maclink-serve-publish".to_string())
            .spawn(move || {
                for body in rx {
                    let delivered = publisher.publish_topic(COMMAND_TOPIC, body);
                    tracing::debug!(delivered, "republished command");
                }
                publisher.close();
            })
            .map_err(|err| CliError::new(INTERNAL, format!("republisher: {err}")))?;
        Ok(Self { tx, worker })
    }

    fn sender(&self) -> mpsc::Sender<Bytes> {
        self.tx.clone()
    }

    /// Publish what is still queued, then close the publisher.
    ///
    /// Returns once every sender handed out has been dropped.
    fn finish(self) {
        drop(self.tx);
        if self.worker.join().is_err() {
            tracing::warn!("republisher thread panicked");
        }
    }
}

/// Acknowledge JSON objects carrying a string `cmd` field.
fn handle_request(request: &Message) -> (Bytes, bool) {
    let reply = match serde_json::from_slice::<Value>(request.first()) {
        Ok(Value::Object(map)) => match map.get("cmd").and_then(Value::as_str) {
            Some(cmd) => {
                tracing::info!(cmd, "command");
                return (encode(&Reply::ok()), true);
            }
            None => Reply::failed("missing \"cmd\" field"),
        },
        Ok(_) => Reply::failed("request must be a JSON object"),
        Err(err) => Reply::failed(format!("invalid JSON: {err}")),
    };
    (encode(&reply), false)
}

fn encode(reply: &Reply) -> Bytes {
    match reply.to_json() {
        Ok(json) => Bytes::from(json),
        Err(_) => Bytes::from_static(br#"{"success":false}"#),
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use maclink_frame::{receive_message, FrameReader};
    use maclink_socket::{Endpoint, PublisherConfig};
    use maclink_transport::UnixDomainSocket;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    fn temp_endpoint(tag: &str) -> (std::path::PathBuf, Endpoint) {
        let dir = std::env::temp_dir().join(format!(
            "maclink-serve-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let endpoint = Endpoint::from_path(dir.join("pub.sock"));
        (dir, endpoint)
    }

    #[test]
    fn forwarded_commands_reach_subscribers() {
        let (dir, endpoint) = temp_endpoint("forward");
        let publisher = Publisher::bind(&endpoint).unwrap();
        let stream = UnixDomainSocket::connect_endpoint(&endpoint).unwrap();
        let mut reader = FrameReader::new(stream);
        assert!(publisher.wait_for_subscribers(1, WAIT));

        let republisher = Republisher::spawn(publisher).unwrap();
        republisher
            .sender()
            .send(Bytes::from_static(br#"{"cmd":"g.show"}"#))
            .unwrap();

        let msg = receive_message(&mut reader).unwrap();
        assert_eq!(msg.frames()[0].as_ref(), COMMAND_TOPIC.as_bytes());
        assert_eq!(msg.frames()[1].as_ref(), br#"{"cmd":"g.show"}"#);

        republisher.finish();
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn stalled_subscriber_does_not_hold_up_the_handler() {
        let (dir, endpoint) = temp_endpoint("stall");
        let publisher = Publisher::bind_with_config(
            &endpoint,
            PublisherConfig {
                send_timeout: Duration::from_millis(300),
                max_payload_size: 4 * 1024 * 1024,
                ..PublisherConfig::default()
            },
        )
        .unwrap();
        // Never reads.
        let _stalled = UnixDomainSocket::connect_endpoint(&endpoint).unwrap();
        assert!(publisher.wait_for_subscribers(1, WAIT));

        let republisher = Republisher::spawn(publisher).unwrap();
        let commands = republisher.sender();
        let body = Bytes::from(vec![b'x'; 1024 * 1024]);

        let started = Instant::now();
        for _ in 0..4 {
            commands.send(body.clone()).unwrap();
        }
        assert!(
            started.elapsed() < Duration::from_millis(100),
            "forwarding blocked for {:?}",
            started.elapsed()
        );

        drop(commands);
        republisher.finish();
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn accepts_commands_and_rejects_other_input() {
        let (reply, accepted) = handle_request(&Message::single(r#"{"cmd":"g.show"}"#));
        assert!(accepted);
        assert_eq!(reply.as_ref(), br#"{"success":true}"#);

        let (reply, accepted) = handle_request(&Message::single("not json"));
        assert!(!accepted);
        assert!(!Reply::parse(&reply).unwrap().success);

        let (_, accepted) = handle_request(&Message::single(r#"{"name":"home"}"#));
        assert!(!accepted);
    }
}
