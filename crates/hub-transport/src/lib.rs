//! C1 (Transport) and C2 (MCP Client): stdio process framing and typed
//! JSON-RPC methods for one backend connection.

mod client;
mod protocol;
mod transport;

pub use client::McpClient;
pub use protocol::{JSONRPC_VERSION, MCP_PROTOCOL_VERSION, METHOD_NOT_FOUND};
pub use transport::{Transport, TransportEvent};
