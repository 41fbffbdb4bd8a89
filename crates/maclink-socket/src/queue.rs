//! Shared access to one command connection from many threads.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, SocketError};
use crate::request::CommandClient;

enum Job {
    Call {
        payload: Vec<u8>,
        reply: mpsc::Sender<Result<Bytes>>,
    },
    Shutdown,
}

/// Serializes calls from any number of threads onto one [`CommandClient`].
///
/// The client lives on a dedicated worker thread. Requests are served one at
/// a time in the order they were enqueued.
pub struct CommandQueue {
    tx: mpsc::Sender<Job>,
    worker: Option<JoinHandle<()>>,
}

/// Cloneable handle for issuing calls through a [`CommandQueue`].
#[derive(Clone)]
pub struct CommandHandle {
    tx: mpsc::Sender<Job>,
}

impl CommandQueue {
    /// Move `client` onto a new worker thread.
    pub fn spawn(client: CommandClient) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("maclink-command".to_string())
            .spawn(move || run_worker(client, rx))
            .map_err(|err| SocketError::Worker(err.to_string()))?;
        Ok(Self {
            tx,
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> CommandHandle {
        CommandHandle {
            tx: self.tx.clone(),
        }
    }

    /// Finish queued calls, close the connection and stop the worker.
    ///
    /// Calls made afterwards through outstanding handles fail with
    /// [`SocketError::Disconnected`].
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // The worker may already be gone; joining reports why.
        let _ = self.tx.send(Job::Shutdown);
        worker
            .join()
            .map_err(|_| SocketError::Worker("command worker panicked".to_string()))
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(error = %err, "command queue shutdown failed");
        }
    }
}

impl CommandHandle {
    /// Serialize and enqueue `request`, then wait for its reply.
    pub fn call<T: Serialize + ?Sized>(&self, request: &T) -> Result<Bytes> {
        let payload = serde_json::to_vec(request)?;
        self.call_raw(payload)
    }

    pub fn call_raw(&self, payload: impl Into<Vec<u8>>) -> Result<Bytes> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(Job::Call {
                payload: payload.into(),
                reply: reply_tx,
            })
            .map_err(|_| queue_closed())?;
        reply_rx.recv().map_err(|_| queue_closed())?
    }
}

fn queue_closed() -> SocketError {
    SocketError::Disconnected("command queue is shut down".to_string())
}

fn run_worker(mut client: CommandClient, rx: mpsc::Receiver<Job>) {
    debug!(endpoint = %client.endpoint(), "command worker started");
    for job in rx {
        match job {
            Job::Call { payload, reply } => {
                let result = client.call_raw(&payload);
                // The caller may have given up waiting.
                let _ = reply.send(result);
            }
            Job::Shutdown => break,
        }
    }
    client.close();
    debug!(endpoint = %client.endpoint(), "command worker stopped");
}
