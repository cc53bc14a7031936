//! C2: wraps a `Transport` with request/response correlation, typed MCP
//! methods, and per-method timeouts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hub_core::{Capabilities, HubError, ToolDescriptor};
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};

use crate::protocol::{parse_line, IncomingMessage, JsonRpcRequest, RequestId, METHOD_NOT_FOUND};
use crate::transport::{Transport, TransportEvent};

/// Timeout applied to `tools/list`, `resources/list`, `resources/templates/list`.
/// `tools/call` and `initialize` have no client-enforced timeout; higher
/// layers (the supervisor's connect timeout, the executor's retry loop)
/// bound those instead (`spec.md` §4.2, §4.3, §5).
const LIST_METHOD_TIMEOUT: Duration = Duration::from_secs(5);

type PendingMap = Arc<Mutex<HashMap<i64, oneshot::Sender<IncomingMessage>>>>;

/// A live MCP conversation with one backend: owns the transport, correlates
/// replies to outstanding requests by numeric id, and exposes typed methods.
pub struct McpClient {
    server_name: String,
    next_id: AtomicI64,
    transport: Arc<Transport>,
    pending: PendingMap,
}

impl McpClient {
    /// Takes ownership of `transport` and starts its read loop on a
    /// background task.
    pub fn new(server_name: impl Into<String>, transport: Transport) -> Self {
        let server_name = server_name.into();
        let transport = Arc::new(transport);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let reader_transport = transport.clone();
        let reader_pending = pending.clone();
        tokio::spawn(async move {
            loop {
                match reader_transport.recv().await {
                    Some(TransportEvent::Message(line)) => match parse_line(&line) {
                        Ok(IncomingMessage::Response(resp)) => {
                            if let Some(RequestId::Number(id)) = resp.id.clone() {
                                let mut guard = reader_pending.lock().await;
                                if let Some(sender) = guard.remove(&id) {
                                    let _ = sender.send(IncomingMessage::Response(resp));
                                } else {
                                    tracing::warn!(id, "unmatched MCP response dropped");
                                }
                            } else {
                                tracing::warn!("MCP response without numeric id dropped");
                            }
                        }
                        Ok(IncomingMessage::Notification(notif)) => {
                            tracing::debug!(method = ?notif.method, "MCP notification received");
                        }
                        Err(error) => {
                            tracing::warn!(%error, "malformed MCP frame ignored");
                        }
                    },
                    Some(TransportEvent::Error(error)) => {
                        tracing::warn!(%error, "MCP transport error");
                    }
                    Some(TransportEvent::Closed) | None => {
                        reader_pending.lock().await.clear();
                        break;
                    }
                }
            }
        });

        Self {
            server_name,
            next_id: AtomicI64::new(1),
            transport,
            pending,
        }
    }

    /// Issues a request and awaits its reply, optionally bounded by
    /// `timeout`. Fails with `ProtocolMismatch` if the reply cannot be
    /// deserialized into `T`, `MethodNotFound` on JSON-RPC code `-32601`.
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<T, HubError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        let body = serde_json::to_string(&request).map_err(|_| HubError::ProtocolMismatch {
            server: self.server_name.clone(),
            method: method.to_string(),
        })?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        self.transport.send(&body).await.map_err(|_| {
            HubError::NotConnected(self.server_name.clone())
        })?;

        let incoming = match timeout {
            Some(duration) => tokio::time::timeout(duration, rx)
                .await
                .map_err(|_| HubError::ConnectTimeout(self.server_name.clone()))?,
            None => rx.await,
        };

        let IncomingMessage::Response(response) = incoming.map_err(|_| {
            self.pending_cleanup(id);
            HubError::NotConnected(self.server_name.clone())
        })?
        else {
            unreachable!("pending map only ever stores Response values");
        };

        match response.into_result() {
            Ok(value) => serde_json::from_value(value).map_err(|_| HubError::ProtocolMismatch {
                server: self.server_name.clone(),
                method: method.to_string(),
            }),
            Err(err) if err.code == METHOD_NOT_FOUND => Err(HubError::MethodNotFound {
                server: self.server_name.clone(),
                method: method.to_string(),
            }),
            Err(err) => Err(HubError::ToolCallFailed {
                server: self.server_name.clone(),
                tool: method.to_string(),
                cause: err.message,
            }),
        }
    }

    fn pending_cleanup(&self, id: i64) {
        let pending = self.pending.clone();
        tokio::spawn(async move {
            pending.lock().await.remove(&id);
        });
    }

    /// `initialize`: no client-enforced timeout here; the supervisor bounds
    /// the whole connect attempt at 10s (`spec.md` §4.3).
    pub async fn initialize(&self, client_name: &str, client_version: &str) -> Result<Capabilities, HubError> {
        let params = json!({
            "protocolVersion": crate::protocol::MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": client_name, "version": client_version },
        });
        let result: Value = self.call("initialize", Some(params), None).await?;
        Ok(Capabilities {
            tools: result
                .get("capabilities")
                .and_then(|c| c.get("tools"))
                .is_some(),
            resources: result
                .get("capabilities")
                .and_then(|c| c.get("resources"))
                .is_some(),
            resource_templates: result
                .get("capabilities")
                .and_then(|c| c.get("resources"))
                .and_then(|r| r.get("templates"))
                .is_some(),
        })
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, HubError> {
        #[derive(serde::Deserialize)]
        struct ListToolsResult {
            #[serde(default)]
            tools: Vec<ToolDescriptor>,
        }
        match self
            .call::<ListToolsResult>("tools/list", None, Some(LIST_METHOD_TIMEOUT))
            .await
        {
            Ok(result) => Ok(result.tools),
            Err(HubError::MethodNotFound { .. }) => Ok(Vec::new()),
            Err(other) => Err(other),
        }
    }

    /// `tools/call`: no per-request timeout (`spec.md` §4.2); callers (the
    /// executor, via the per-server queue) are responsible for retry/timeout
    /// policy.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, HubError> {
        let params = json!({ "name": name, "arguments": arguments });
        self.call("tools/call", Some(params), None).await
    }

    pub async fn list_resources(&self) -> Result<Vec<Value>, HubError> {
        #[derive(serde::Deserialize)]
        struct ListResourcesResult {
            #[serde(default)]
            resources: Vec<Value>,
        }
        match self
            .call::<ListResourcesResult>("resources/list", None, Some(LIST_METHOD_TIMEOUT))
            .await
        {
            Ok(result) => Ok(result.resources),
            Err(HubError::MethodNotFound { .. }) => Ok(Vec::new()),
            Err(other) => Err(other),
        }
    }

    pub async fn list_resource_templates(&self) -> Result<Vec<Value>, HubError> {
        #[derive(serde::Deserialize)]
        struct ListTemplatesResult {
            #[serde(default, rename = "resourceTemplates")]
            resource_templates: Vec<Value>,
        }
        match self
            .call::<ListTemplatesResult>(
                "resources/templates/list",
                None,
                Some(LIST_METHOD_TIMEOUT),
            )
            .await
        {
            Ok(result) => Ok(result.resource_templates),
            Err(HubError::MethodNotFound { .. }) => Ok(Vec::new()),
            Err(other) => Err(other),
        }
    }

    pub async fn shutdown(&self) {
        self.transport.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    /// Spawns a task that plays a fixed, scripted backend: reads one
    /// request line at a time and writes back a canned reply.
    fn spawn_fake_backend(
        mut server_reader: impl tokio::io::AsyncRead + Send + Unpin + 'static,
        mut server_writer: impl tokio::io::AsyncWrite + Send + Unpin + 'static,
        script: Vec<Value>,
    ) {
        tokio::spawn(async move {
            let mut lines = BufReader::new(&mut server_reader).lines();
            for reply in script {
                let _ = lines.next_line().await;
                let mut body = serde_json::to_string(&reply).unwrap();
                body.push('\n');
                let _ = server_writer.write_all(body.as_bytes()).await;
            }
        });
    }

    #[tokio::test]
    async fn list_tools_returns_empty_on_method_not_found() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let (client_reader, client_writer) = tokio::io::split(client_io);
        let (server_reader, server_writer) = tokio::io::split(server_io);

        spawn_fake_backend(
            server_reader,
            server_writer,
            vec![json!({"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"not found"}})],
        );

        let transport = Transport::from_duplex("fake", client_reader, client_writer);
        let client = McpClient::new("fake", transport);

        let tools = client.list_tools().await.unwrap();
        assert!(tools.is_empty());
    }

    #[tokio::test]
    async fn call_tool_round_trips_a_result() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let (client_reader, client_writer) = tokio::io::split(client_io);
        let (server_reader, server_writer) = tokio::io::split(server_io);

        spawn_fake_backend(
            server_reader,
            server_writer,
            vec![json!({
                "jsonrpc":"2.0","id":1,
                "result": {"content":[{"type":"text","text":"hi"}]}
            })],
        );

        let transport = Transport::from_duplex("fake", client_reader, client_writer);
        let client = McpClient::new("fake", transport);

        let result = client.call_tool("say", json!({"msg":"hi"})).await.unwrap();
        assert_eq!(result["content"][0]["text"], "hi");
    }

    #[tokio::test]
    async fn list_tools_parses_descriptors() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let (client_reader, client_writer) = tokio::io::split(client_io);
        let (server_reader, server_writer) = tokio::io::split(server_io);

        spawn_fake_backend(
            server_reader,
            server_writer,
            vec![json!({
                "jsonrpc":"2.0","id":1,
                "result": {"tools":[{"name":"greet","inputSchema":{"properties":{"name":{"type":"string"}},"required":["name"]}}]}
            })],
        );

        let transport = Transport::from_duplex("fake", client_reader, client_writer);
        let client = McpClient::new("fake", transport);

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "greet");
        assert_eq!(tools[0].input_schema.required, vec!["name"]);
    }
}
