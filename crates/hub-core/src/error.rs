//! Closed error taxonomy shared by every layer of the hub.
//!
//! One enum crosses all crate boundaries so callers can match on a single
//! type regardless of which layer (transport, executor, composer) raised it.

#[derive(thiserror::Error, Debug)]
pub enum HubError {
    #[error("no configuration for server '{0}'")]
    ConfigMissing(String),

    #[error("failed to spawn server '{server}': {cause}")]
    SpawnFailed { server: String, cause: String },

    #[error("connection to '{0}' timed out")]
    ConnectTimeout(String),

    #[error("server '{0}' exceeded max retry attempts; manual reconnect required")]
    MaxRetriesExceeded(String),

    #[error("server '{0}' is not connected")]
    NotConnected(String),

    #[error("reply from '{server}' for method '{method}' did not match the expected schema")]
    ProtocolMismatch { server: String, method: String },

    #[error("server '{server}' does not implement method '{method}'")]
    MethodNotFound { server: String, method: String },

    #[error("tool '{tool}' not found on server '{server}'; available: {available:?}")]
    ToolNotFound {
        server: String,
        tool: String,
        available: Vec<String>,
    },

    #[error("required fields missing for '{server}/{tool}': {fields:?}")]
    MissingFields {
        server: String,
        tool: String,
        fields: Vec<String>,
    },

    #[error("user denied confirmation for '{server}/{tool}'")]
    UserDenied { server: String, tool: String },

    #[error("hub is overloaded: {active}/{max} operations in flight")]
    OverloadedError { active: usize, max: usize },

    #[error("tool call '{server}/{tool}' failed: {cause}")]
    ToolCallFailed {
        server: String,
        tool: String,
        cause: String,
    },

    #[error("validation failed for composed tool '{0}': {1}")]
    ValidationError(String, String),

    #[error("circular dependency detected in composed tool '{tool}': {path:?}")]
    CircularDependency { tool: String, path: Vec<String> },

    #[error("output reference '{step}.{path}' is not compatible with step '{step}' declared output")]
    SchemaCompatibility { step: String, path: String },

    #[error("step '{step_name}' referenced output of '{referenced}', which did not succeed")]
    ReferenceUnavailable {
        step_name: String,
        referenced: String,
    },

    #[error("condition on step '{step_name}' refers to a later step '{referenced}'")]
    ForwardReference {
        step_name: String,
        referenced: String,
    },

    #[error("hub is not initialized")]
    HubNotInitialized,
}

pub type HubResult<T> = std::result::Result<T, HubError>;
