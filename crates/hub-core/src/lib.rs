//! Shared types and error taxonomy for the tool dispatch hub workspace.

mod error;
mod model;
pub mod registry;

pub use error::{HubError, HubResult};
pub use model::{
    CallRecord, Capabilities, ConnectionStatus, ConnectionStatusRecord, DangerLevel, FieldSchema,
    InputSchema, LastOperation, OperationType, SafetyDescriptor, ServerConfig, ServerContext,
    ToolDescriptor,
};
