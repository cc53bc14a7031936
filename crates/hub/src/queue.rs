//! C4: FIFO serialization of tool calls against one backend, plus a
//! hub-wide admission counter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hub_core::HubError;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::supervisor::ConnectionSupervisor;

pub const MAX_CONCURRENT_OPERATIONS: usize = 5;

/// Hub-wide admission control: a single atomic counter shared by every
/// per-server queue.
#[derive(Default)]
pub struct AdmissionControl {
    active: AtomicUsize,
}

impl AdmissionControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Atomically checks the cap and reserves a slot; returns `None` (no
    /// mutation) if the hub is at capacity.
    fn try_acquire(&self) -> Option<AdmissionGuard<'_>> {
        loop {
            let current = self.active.load(Ordering::SeqCst);
            if current >= MAX_CONCURRENT_OPERATIONS {
                return None;
            }
            if self
                .active
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Some(AdmissionGuard { control: self });
            }
        }
    }
}

struct AdmissionGuard<'a> {
    control: &'a AdmissionControl,
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.control.active.fetch_sub(1, Ordering::SeqCst);
    }
}

enum Job {
    CallTool {
        tool_name: String,
        args: Value,
        reply: oneshot::Sender<Result<Value, HubError>>,
    },
}

/// One FIFO worker per server. Callers enqueue through `call_tool`; the
/// worker dequeues and dispatches exactly one call at a time against the
/// backend, so per-server tool-call effects are observed in acceptance
/// order even under concurrent callers (`spec.md` §5).
pub struct ServerCallQueue {
    server_name: String,
    sender: mpsc::Sender<Job>,
}

const QUEUE_CAPACITY: usize = 64;

impl ServerCallQueue {
    pub fn spawn(supervisor: Arc<ConnectionSupervisor>, admission: Arc<AdmissionControl>) -> Self {
        let server_name = supervisor.name().to_string();
        let (sender, mut receiver) = mpsc::channel::<Job>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                match job {
                    Job::CallTool {
                        tool_name,
                        args,
                        reply,
                    } => {
                        let result = dispatch(&supervisor, &tool_name, args).await;
                        let _ = reply.send(result);
                    }
                }
            }
        });

        // admission is checked at enqueue time, not inside the worker, so
        // store nothing extra here; kept as a field would be unused.
        let _ = admission;

        Self {
            server_name,
            sender,
        }
    }

    /// Enqueues a call. Fails synchronously with `OverloadedError` without
    /// mutating any state if the hub is already at `MAX_CONCURRENT_OPERATIONS`
    /// (`spec.md` §4.4, invariant 2).
    pub async fn call_tool(
        &self,
        admission: &AdmissionControl,
        tool_name: &str,
        args: Value,
    ) -> Result<Value, HubError> {
        let Some(guard) = admission.try_acquire() else {
            return Err(HubError::OverloadedError {
                active: admission.active_count(),
                max: MAX_CONCURRENT_OPERATIONS,
            });
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(Job::CallTool {
                tool_name: tool_name.to_string(),
                args,
                reply: reply_tx,
            })
            .await
            .map_err(|_| HubError::NotConnected(self.server_name.clone()))?;

        let result = reply_rx
            .await
            .map_err(|_| HubError::NotConnected(self.server_name.clone()))?;
        drop(guard);
        result
    }
}

async fn dispatch(
    supervisor: &ConnectionSupervisor,
    tool_name: &str,
    args: Value,
) -> Result<Value, HubError> {
    let client = supervisor.ensure_connection().await?;
    match client.call_tool(tool_name, args).await {
        Ok(value) => Ok(value),
        // `NotConnected` from the client means its transport is already
        // closed (send failed, or the reply channel was dropped by the
        // reader loop on `TransportEvent::Closed`/`Error`) — the supervisor
        // needs to know so the next `ensure_connection` reconnects instead
        // of handing back the same dead client (`spec.md` §4.3, §5).
        Err(HubError::NotConnected(_)) => {
            supervisor
                .mark_disconnected("tool call observed a closed transport".to_string())
                .await;
            Err(HubError::ToolCallFailed {
                server: supervisor.name().to_string(),
                tool: tool_name.to_string(),
                cause: "transport closed".to_string(),
            })
        }
        Err(error) => Err(HubError::ToolCallFailed {
            server: supervisor.name().to_string(),
            tool: tool_name.to_string(),
            cause: error.to_string(),
        }),
    }
}
