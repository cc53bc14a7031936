//! C5: caches each server's tool descriptors, published as an immutable
//! snapshot whenever the supervisor reaches `connected`.

use std::collections::HashMap;
use std::sync::RwLock;

use hub_core::{HubError, ToolDescriptor};

/// `serverName → (toolName → ToolDescriptor)`. Lookups are non-blocking;
/// replacement of a server's entries is a pointer swap (`spec.md` §5).
#[derive(Default)]
pub struct ToolCatalog {
    by_server: RwLock<HashMap<String, HashMap<String, ToolDescriptor>>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a freshly fetched descriptor list for `server_name`,
    /// replacing any previous snapshot atomically.
    pub fn publish(&self, server_name: &str, tools: Vec<ToolDescriptor>) {
        let map = tools.into_iter().map(|t| (t.name.clone(), t)).collect();
        self.by_server
            .write()
            .expect("catalog lock poisoned")
            .insert(server_name.to_string(), map);
    }

    pub fn get(&self, server_name: &str, tool_name: &str) -> Result<ToolDescriptor, HubError> {
        let guard = self.by_server.read().expect("catalog lock poisoned");
        let server_tools = guard.get(server_name);
        match server_tools.and_then(|tools| tools.get(tool_name)) {
            Some(descriptor) => Ok(descriptor.clone()),
            None => Err(HubError::ToolNotFound {
                server: server_name.to_string(),
                tool: tool_name.to_string(),
                available: server_tools
                    .map(|tools| tools.keys().cloned().collect())
                    .unwrap_or_default(),
            }),
        }
    }

    pub fn list(&self, server_name: &str) -> Vec<ToolDescriptor> {
        self.by_server
            .read()
            .expect("catalog lock poisoned")
            .get(server_name)
            .map(|tools| tools.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_tool(&self, server_name: &str, tool_name: &str) -> bool {
        self.by_server
            .read()
            .expect("catalog lock poisoned")
            .get(server_name)
            .is_some_and(|tools| tools.contains_key(tool_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::InputSchema;

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: None,
            input_schema: InputSchema::default(),
            safety: None,
        }
    }

    #[test]
    fn unknown_tool_reports_available_names() {
        let catalog = ToolCatalog::new();
        catalog.publish("gh", vec![descriptor("create_repo"), descriptor("delete_repo")]);

        let err = catalog.get("gh", "push_files").unwrap_err();
        match err {
            HubError::ToolNotFound { available, .. } => {
                assert!(available.contains(&"create_repo".to_string()));
                assert!(available.contains(&"delete_repo".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn publish_replaces_previous_snapshot() {
        let catalog = ToolCatalog::new();
        catalog.publish("gh", vec![descriptor("a")]);
        assert!(catalog.has_tool("gh", "a"));

        catalog.publish("gh", vec![descriptor("b")]);
        assert!(!catalog.has_tool("gh", "a"));
        assert!(catalog.has_tool("gh", "b"));
    }

    #[test]
    fn lookup_on_unknown_server_reports_empty_available() {
        let catalog = ToolCatalog::new();
        let err = catalog.get("missing", "tool").unwrap_err();
        match err {
            HubError::ToolNotFound { available, .. } => assert!(available.is_empty()),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
