//! The hub crate: C3 (connection supervision), C4 (per-server queue plus
//! hub-wide admission control), C5 (tool catalog), and C8 (the facade that
//! composes them into one entry point).

mod catalog;
mod facade;
mod queue;
mod supervisor;

pub use catalog::ToolCatalog;
pub use facade::Hub;
pub use queue::{AdmissionControl, ServerCallQueue, MAX_CONCURRENT_OPERATIONS};
pub use supervisor::{ConnectionSupervisor, CONNECTION_TIMEOUT, MAX_RETRY_ATTEMPTS};
