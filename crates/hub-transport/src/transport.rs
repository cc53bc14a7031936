//! C1: owns a child process (or, in tests, an in-memory duplex) and frames
//! JSON-RPC messages over its stdio.
//!
//! Framing is one JSON-encoded message per line (`spec.md` §4.1). Malformed
//! frames are the client's concern (protocol layer); this module only
//! reports I/O-level errors and closure.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hub_core::{HubError, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events delivered to the client in the order they occurred, per
/// `spec.md` §4.1 ("delivery is in-order").
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Message(String),
    Error(String),
    Closed,
}

pub struct Transport {
    server_name: String,
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    events: Mutex<mpsc::Receiver<TransportEvent>>,
    closed: Arc<AtomicBool>,
    child: Mutex<Option<Child>>,
}

impl Transport {
    /// Spawns the configured command with a merged environment: process env
    /// overlaid with the server-specific env, server overlay taking
    /// precedence (`spec.md` §4.1).
    pub async fn spawn(config: &ServerConfig) -> Result<Self, HubError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);
        cmd.envs(std::env::vars());
        cmd.envs(config.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| HubError::SpawnFailed {
            server: config.name.clone(),
            cause: e.to_string(),
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HubError::SpawnFailed {
                server: config.name.clone(),
                cause: "failed to capture stdout".into(),
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| HubError::SpawnFailed {
                server: config.name.clone(),
                cause: "failed to capture stdin".into(),
            })?;
        let stderr = child.stderr.take();

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));

        spawn_reader(config.name.clone(), stdout, events_tx, closed.clone());
        if let Some(stderr) = stderr {
            spawn_stderr_forwarder(config.name.clone(), stderr);
        }

        Ok(Self {
            server_name: config.name.clone(),
            writer: Mutex::new(Box::new(stdin)),
            events: Mutex::new(events_rx),
            closed,
            child: Mutex::new(Some(child)),
        })
    }

    /// Builds a transport over an arbitrary duplex pair, for tests that
    /// stand in a fake backend without spawning a real process.
    pub fn from_duplex(
        server_name: impl Into<String>,
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        let server_name = server_name.into();
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));
        spawn_reader(server_name.clone(), reader, events_tx, closed.clone());

        Self {
            server_name,
            writer: Mutex::new(Box::new(writer)),
            events: Mutex::new(events_rx),
            closed,
            child: Mutex::new(None),
        }
    }

    /// Serializes one outgoing message as a single LF-delimited line. At
    /// most one inflight `send` is serialized per `spec.md` §4.1.
    pub async fn send(&self, message: &str) -> Result<(), HubError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(HubError::NotConnected(self.server_name.clone()));
        }

        let mut line = String::with_capacity(message.len() + 1);
        line.push_str(message);
        line.push('\n');

        let mut writer = self.writer.lock().await;
        if writer.write_all(line.as_bytes()).await.is_err() || writer.flush().await.is_err() {
            self.closed.store(true, Ordering::SeqCst);
            return Err(HubError::NotConnected(self.server_name.clone()));
        }
        Ok(())
    }

    /// Awaits the next transport event, in arrival order. Concurrent callers
    /// are serialized by the internal lock; in practice a single reader
    /// task owns this.
    pub async fn recv(&self) -> Option<TransportEvent> {
        self.events.lock().await.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the transport, killing the child process (if any) after a
    /// grace period.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(mut child) = self.child.lock().await.take() {
            let grace = tokio::time::timeout(std::time::Duration::from_secs(3), child.wait()).await;
            if grace.is_err() {
                let _ = child.kill().await;
            }
        }
    }
}

fn spawn_reader(
    server_name: String,
    reader: impl AsyncRead + Send + Unpin + 'static,
    events: mpsc::Sender<TransportEvent>,
    closed: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if events.send(TransportEvent::Message(line)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    closed.store(true, Ordering::SeqCst);
                    let _ = events.send(TransportEvent::Closed).await;
                    break;
                }
                Err(error) => {
                    let _ = events
                        .send(TransportEvent::Error(format!(
                            "transport read error for '{server_name}': {error}"
                        )))
                        .await;
                }
            }
        }
    });
}

fn spawn_stderr_forwarder(server_name: String, stderr: impl AsyncRead + Send + Unpin + 'static) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(server = %server_name, "{line}");
        }
    });
}
