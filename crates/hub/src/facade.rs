//! C8: the hub's stable public entry points.

use std::collections::HashMap;
use std::sync::Arc;

use hub_core::{ConnectionStatusRecord, HubError, ServerConfig, ToolDescriptor};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::catalog::ToolCatalog;
use crate::queue::{AdmissionControl, ServerCallQueue};
use crate::supervisor::ConnectionSupervisor;

struct ServerEntry {
    supervisor: Arc<ConnectionSupervisor>,
    queue: ServerCallQueue,
}

/// Public entry point for the MCP Hub (C1–C5 wired together). Callers
/// invoke this directly for single tool calls; the composition executor
/// (a separate crate) invokes `call_tool` many times to run a workflow.
pub struct Hub {
    servers: HashMap<String, ServerEntry>,
    catalog: Arc<ToolCatalog>,
    admission: Arc<AdmissionControl>,
}

impl Hub {
    /// Spawns and connects all configured servers in parallel. A single
    /// server's connect failure is recorded on its own status record and
    /// never propagated as a fatal error for the whole hub (`spec.md` §6).
    pub async fn initialize(configs: Vec<ServerConfig>) -> Self {
        let catalog = Arc::new(ToolCatalog::new());
        let admission = Arc::new(AdmissionControl::new());

        let mut servers = HashMap::new();
        let mut supervisors = Vec::new();
        for config in configs {
            let supervisor = Arc::new(ConnectionSupervisor::new(config, catalog.clone()));
            let queue = ServerCallQueue::spawn(supervisor.clone(), admission.clone());
            servers.insert(
                supervisor.name().to_string(),
                ServerEntry {
                    supervisor: supervisor.clone(),
                    queue,
                },
            );
            supervisors.push(supervisor);
        }

        let hub = Self {
            servers,
            catalog,
            admission,
        };

        let attempts = supervisors
            .into_iter()
            .map(|supervisor| async move {
                if let Err(error) = supervisor.ensure_connection().await {
                    tracing::warn!(server = %supervisor.name(), %error, "initial connect failed");
                }
            });
        futures_join_all(attempts).await;

        hub
    }

    pub async fn list_connections(&self) -> Vec<ConnectionStatusRecord> {
        let mut records = Vec::with_capacity(self.servers.len());
        for entry in self.servers.values() {
            records.push(entry.supervisor.status_record().await);
        }
        records
    }

    pub fn list_tools(&self, server_name: &str) -> Vec<ToolDescriptor> {
        self.catalog.list(server_name)
    }

    pub fn tool_descriptor(&self, server_name: &str, tool_name: &str) -> Result<ToolDescriptor, HubError> {
        self.catalog.get(server_name, tool_name)
    }

    pub fn has_tool(&self, server_name: &str, tool_name: &str) -> bool {
        self.catalog.has_tool(server_name, tool_name)
    }

    /// Direct catalog access for callers that publish descriptors outside
    /// the normal connect flow (tests, and offline tooling inspection).
    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Dispatches a validated call through the server's FIFO queue, subject
    /// to hub-wide admission control (`spec.md` §4.4).
    pub async fn call_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<Value, HubError> {
        let entry = self
            .servers
            .get(server_name)
            .ok_or_else(|| HubError::ConfigMissing(server_name.to_string()))?;
        entry
            .queue
            .call_tool(&self.admission, tool_name, arguments)
            .await
    }

    pub fn on_status_change(
        &self,
        server_name: &str,
    ) -> Result<broadcast::Receiver<ConnectionStatusRecord>, HubError> {
        self.servers
            .get(server_name)
            .map(|entry| entry.supervisor.subscribe())
            .ok_or_else(|| HubError::ConfigMissing(server_name.to_string()))
    }

    pub async fn reconnect_server(&self, server_name: &str) -> Result<(), HubError> {
        let entry = self
            .servers
            .get(server_name)
            .ok_or_else(|| HubError::ConfigMissing(server_name.to_string()))?;
        entry.supervisor.reconnect().await.map(|_| ())
    }

    pub fn server_names(&self) -> Vec<String> {
        self.servers.keys().cloned().collect()
    }

    pub fn active_operation_count(&self) -> usize {
        self.admission.active_count()
    }
}

/// Small local stand-in for `futures::future::join_all` so the crate does
/// not need to pull in the `futures` crate for a single call site.
async fn futures_join_all<I>(iter: I)
where
    I: IntoIterator,
    I::Item: std::future::Future<Output = ()>,
{
    let mut set = tokio::task::JoinSet::new();
    for fut in iter {
        set.spawn(fut);
    }
    while set.join_next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initialize_never_fails_fatally_on_one_bad_server() {
        let configs = vec![ServerConfig {
            name: "bad".into(),
            command: "/nonexistent/does-not-exist".into(),
            args: vec![],
            env: Default::default(),
        }];
        let hub = Hub::initialize(configs).await;
        let records = hub.list_connections().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "bad");
    }

    #[tokio::test]
    async fn call_tool_on_unconfigured_server_fails_config_missing() {
        let hub = Hub::initialize(vec![]).await;
        let err = hub
            .call_tool("nope", "whatever", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::ConfigMissing(_)));
    }
}
