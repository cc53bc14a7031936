//! Shared data model: configuration, connection state, and tool descriptors.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declarative spec of one backend, sourced from configuration at hub
/// startup and immutable for the hub's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Status of a `Connection`, per the state machine in `spec.md` §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Capability flags advertised by a server's `initialize` reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub tools: bool,
    #[serde(default)]
    pub resources: bool,
    #[serde(default, rename = "resourceTemplates")]
    pub resource_templates: bool,
}

/// A point-in-time view of a server connection, published by the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatusRecord {
    pub name: String,
    pub status: ConnectionStatus,
    pub capabilities: Capabilities,
    pub last_error: Option<String>,
    pub last_successful_connect_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
}

/// JSON-Schema-ish description of one input field. Typed header over an
/// otherwise dynamic value, per the design note in `spec.md` §9.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "enum", default)]
    pub enum_values: Option<Vec<Value>>,
}

/// `inputSchema` of a `ToolDescriptor`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(default)]
    pub properties: HashMap<String, FieldSchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

/// Ordinal danger classification, `spec.md` §GLOSSARY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DangerLevel {
    None,
    Low,
    Medium,
    High,
}

impl Default for DangerLevel {
    fn default() -> Self {
        Self::None
    }
}

/// Safety metadata advertised (optionally) on a `ToolDescriptor`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyDescriptor {
    #[serde(default)]
    pub is_dangerous: Option<bool>,
    #[serde(default)]
    pub danger_level: Option<DangerLevel>,
    #[serde(default)]
    pub danger_description: Option<String>,
    #[serde(default)]
    pub requires_confirmation: Option<bool>,
    #[serde(default)]
    pub confirmation_message: Option<String>,
}

/// Immutable snapshot of one tool, fetched from a backend's `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: InputSchema,
    #[serde(default)]
    pub safety: Option<SafetyDescriptor>,
}

/// The operation verb an invocation is classified under, `spec.md` §4.6.b.
/// Checked in this fixed order (DELETE → WRITE → MODIFY → EXECUTE → FORMAT)
/// per the resolved Open Question in `spec.md` §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Delete,
    Write,
    Modify,
    Execute,
    Format,
}

/// Mutable per-server state owned by the Tool Executor.
#[derive(Debug, Clone, Default)]
pub struct ServerContext {
    pub server_type: Option<String>,
    pub config: Value,
    pub supports_rollback: bool,
    pub max_concurrent_calls: Option<usize>,
    pub supported_operations: Vec<String>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub last_operation: Option<LastOperation>,
}

#[derive(Debug, Clone)]
pub struct LastOperation {
    pub tool_name: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

/// Transient state of one in-flight tool call.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub server_name: String,
    pub tool_name: String,
    pub args: Value,
    pub attempts: u32,
    pub captured_previous_state: Option<Value>,
    pub operation_type: OperationType,
}
