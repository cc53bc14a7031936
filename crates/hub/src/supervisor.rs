//! C3: per-server connection lifecycle, capability negotiation, bounded
//! retry, and status-change broadcast.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hub_core::{Capabilities, ConnectionStatus, ConnectionStatusRecord, HubError, ServerConfig};
use hub_transport::{McpClient, Transport};
use tokio::sync::{broadcast, RwLock};

use crate::catalog::ToolCatalog;

pub const MAX_RETRY_ATTEMPTS: u32 = 3;
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

const CLIENT_NAME: &str = "tool-dispatch-hub";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

struct Inner {
    status: ConnectionStatus,
    capabilities: Capabilities,
    last_error: Option<String>,
    last_successful_connect_at: Option<chrono::DateTime<chrono::Utc>>,
    retry_count: u32,
    client: Option<Arc<McpClient>>,
}

/// Owns the mutable runtime state of one configured server and drives its
/// state machine (`spec.md` §4.3):
/// `disconnected → connecting → connected`, falling back to `disconnected`
/// on spawn/init error, timeout, transport error, or close.
pub struct ConnectionSupervisor {
    name: String,
    config: ServerConfig,
    inner: RwLock<Inner>,
    status_tx: broadcast::Sender<ConnectionStatusRecord>,
    catalog: Arc<ToolCatalog>,
    consecutive_failures: AtomicU32,
}

impl ConnectionSupervisor {
    pub fn new(config: ServerConfig, catalog: Arc<ToolCatalog>) -> Self {
        let (status_tx, _) = broadcast::channel(64);
        Self {
            name: config.name.clone(),
            config,
            inner: RwLock::new(Inner {
                status: ConnectionStatus::Disconnected,
                capabilities: Capabilities::default(),
                last_error: None,
                last_successful_connect_at: None,
                retry_count: 0,
                client: None,
            }),
            status_tx,
            catalog,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionStatusRecord> {
        self.status_tx.subscribe()
    }

    pub async fn status_record(&self) -> ConnectionStatusRecord {
        let inner = self.inner.read().await;
        ConnectionStatusRecord {
            name: self.name.clone(),
            status: inner.status,
            capabilities: inner.capabilities,
            last_error: inner.last_error.clone(),
            last_successful_connect_at: inner.last_successful_connect_at,
            retry_count: inner.retry_count,
        }
    }

    /// Idempotent: returns immediately if already connected, otherwise
    /// attempts to connect bounded by `MAX_RETRY_ATTEMPTS`.
    pub async fn ensure_connection(&self) -> Result<Arc<McpClient>, HubError> {
        {
            let inner = self.inner.read().await;
            if inner.status == ConnectionStatus::Connected {
                if let Some(client) = inner.client.clone() {
                    return Ok(client);
                }
            }
        }

        if self.consecutive_failures.load(Ordering::SeqCst) >= MAX_RETRY_ATTEMPTS {
            return Err(HubError::MaxRetriesExceeded(self.name.clone()));
        }

        self.set_status(ConnectionStatus::Connecting, None).await;

        match tokio::time::timeout(CONNECTION_TIMEOUT, self.connect_once()).await {
            Ok(Ok(client)) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                let mut inner = self.inner.write().await;
                inner.status = ConnectionStatus::Connected;
                inner.last_error = None;
                inner.last_successful_connect_at = Some(chrono::Utc::now());
                inner.retry_count = 0;
                inner.client = Some(client.clone());
                drop(inner);
                self.broadcast_status().await;
                Ok(client)
            }
            Ok(Err(error)) => {
                self.record_failure(error.to_string()).await;
                Err(error)
            }
            Err(_) => {
                let error = HubError::ConnectTimeout(self.name.clone());
                self.record_failure(error.to_string()).await;
                Err(error)
            }
        }
    }

    /// Resets the retry counter and forces a fresh connect attempt,
    /// regardless of whether `MAX_RETRY_ATTEMPTS` was previously reached.
    pub async fn reconnect(&self) -> Result<Arc<McpClient>, HubError> {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        {
            let mut inner = self.inner.write().await;
            inner.retry_count = 0;
            if let Some(client) = inner.client.take() {
                client.shutdown().await;
            }
            inner.status = ConnectionStatus::Disconnected;
        }
        self.ensure_connection().await
    }

    async fn connect_once(&self) -> Result<Arc<McpClient>, HubError> {
        let transport = Transport::spawn(&self.config).await?;
        let client = Arc::new(McpClient::new(self.name.clone(), transport));

        let capabilities = client.initialize(CLIENT_NAME, CLIENT_VERSION).await?;
        {
            let mut inner = self.inner.write().await;
            inner.capabilities = capabilities;
        }

        if capabilities.tools {
            match client.list_tools().await {
                Ok(tools) => self.catalog.publish(&self.name, tools),
                Err(error) => {
                    tracing::warn!(server = %self.name, %error, "tools/list failed after initialize");
                }
            }
        }

        Ok(client)
    }

    async fn record_failure(&self, message: String) {
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.write().await;
        inner.status = ConnectionStatus::Disconnected;
        inner.last_error = Some(message);
        inner.retry_count += 1;
        inner.client = None;
        drop(inner);
        self.broadcast_status().await;
    }

    async fn set_status(&self, status: ConnectionStatus, error: Option<String>) {
        {
            let mut inner = self.inner.write().await;
            inner.status = status;
            if error.is_some() {
                inner.last_error = error;
            }
        }
        self.broadcast_status().await;
    }

    /// Listeners must not block the supervisor; `broadcast::Sender::send`
    /// is synchronous and non-blocking by construction, so this never
    /// awaits a subscriber (`spec.md` §4.3).
    async fn broadcast_status(&self) {
        let record = self.status_record().await;
        let _ = self.status_tx.send(record);
    }

    /// Marks the connection disconnected in response to an observed
    /// transport close/error, without touching the retry counter (that is
    /// only advanced by a failed `ensure_connection` attempt).
    pub async fn mark_disconnected(&self, reason: String) {
        let mut inner = self.inner.write().await;
        inner.status = ConnectionStatus::Disconnected;
        inner.last_error = Some(reason);
        inner.client = None;
        drop(inner);
        self.broadcast_status().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> ServerConfig {
        ServerConfig {
            name: name.to_string(),
            command: "false".to_string(),
            args: vec![],
            env: Default::default(),
        }
    }

    #[tokio::test]
    async fn spawn_failure_surfaces_as_spawn_failed_not_timeout() {
        let catalog = Arc::new(ToolCatalog::new());
        let sup = ConnectionSupervisor::new(
            ServerConfig {
                name: "ghost".into(),
                command: "/nonexistent/does-not-exist".into(),
                args: vec![],
                env: Default::default(),
            },
            catalog,
        );

        let err = sup.ensure_connection().await.unwrap_err();
        assert!(matches!(err, HubError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn max_retries_exceeded_after_repeated_failures() {
        let catalog = Arc::new(ToolCatalog::new());
        let sup = ConnectionSupervisor::new(
            ServerConfig {
                name: "ghost".into(),
                command: "/nonexistent/does-not-exist".into(),
                args: vec![],
                env: Default::default(),
            },
            catalog,
        );

        for _ in 0..MAX_RETRY_ATTEMPTS {
            let _ = sup.ensure_connection().await;
        }
        let err = sup.ensure_connection().await.unwrap_err();
        assert!(matches!(err, HubError::MaxRetriesExceeded(_)));
    }

    #[tokio::test]
    async fn status_record_reflects_initial_disconnected_state() {
        let catalog = Arc::new(ToolCatalog::new());
        let sup = ConnectionSupervisor::new(config("idle"), catalog);
        let record = sup.status_record().await;
        assert_eq!(record.status, ConnectionStatus::Disconnected);
        assert_eq!(record.retry_count, 0);
    }

    #[tokio::test]
    async fn mark_disconnected_broadcasts_and_forces_a_fresh_connect() {
        let catalog = Arc::new(ToolCatalog::new());
        let sup = ConnectionSupervisor::new(config("idle"), catalog);
        let mut statuses = sup.subscribe();

        sup.mark_disconnected("transport closed".to_string()).await;

        let record = sup.status_record().await;
        assert_eq!(record.status, ConnectionStatus::Disconnected);
        assert_eq!(record.last_error.as_deref(), Some("transport closed"));
        // retry_count is untouched — mark_disconnected is not a failed
        // connect attempt, just an observed death of a prior connection.
        assert_eq!(record.retry_count, 0);

        let broadcast = statuses.recv().await.unwrap();
        assert_eq!(broadcast.status, ConnectionStatus::Disconnected);
    }
}
