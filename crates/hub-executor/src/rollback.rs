//! §4.6.b: best-effort previous-state capture and rollback.

use hub_core::OperationType;
use regex::Regex;
use serde_json::{json, Value};
use tool_hub::Hub;

/// Substitutes the matched verb in `tool_name` with `replacement`, leaving
/// the rest of the name untouched.
fn substitute(tool_name: &str, pattern: &Regex, replacement: &str) -> Option<String> {
    if pattern.is_match(tool_name) {
        Some(pattern.replace(tool_name, replacement).into_owned())
    } else {
        None
    }
}

fn delete_or_modify() -> Regex {
    Regex::new(r"(?i)delete|modify").unwrap()
}

fn write_or_modify() -> Regex {
    Regex::new(r"(?i)write|modify").unwrap()
}

fn delete_or_remove() -> Regex {
    Regex::new(r"(?i)delete|remove").unwrap()
}

/// Attempts a best-effort probe call to capture the state a call is about
/// to mutate. Only meaningful for DELETE/MODIFY operations; returns `None`
/// (rollback disabled for this call) if no probe tool exists or the probe
/// itself fails.
pub async fn capture_previous_state(
    hub: &Hub,
    server_name: &str,
    tool_name: &str,
    args: &Value,
    operation: OperationType,
) -> Option<Value> {
    if !matches!(operation, OperationType::Delete | OperationType::Modify) {
        return None;
    }

    let probe_name = substitute(tool_name, &delete_or_modify(), "get")?;
    if !hub.has_tool(server_name, &probe_name) {
        return None;
    }

    let mut probe_args = args.clone();
    if let Some(map) = probe_args.as_object_mut() {
        map.insert("mode".into(), json!("read"));
    }

    match hub.call_tool(server_name, &probe_name, probe_args).await {
        Ok(state) => Some(state),
        Err(error) => {
            tracing::warn!(server = server_name, tool = tool_name, %error, "rollback probe call failed");
            None
        }
    }
}

/// Resolves the paired compensating tool name and call arguments for a
/// previously captured state, if the paired tool exists in the catalog.
pub fn paired_rollback_call(
    hub: &Hub,
    server_name: &str,
    tool_name: &str,
    args: &Value,
    operation: OperationType,
    previous_state: Value,
) -> Option<(String, Value)> {
    let (paired_name, payload) = match operation {
        OperationType::Delete => {
            let name = substitute(tool_name, &delete_or_remove(), "create")?;
            let mut payload = args.clone();
            if let Some(map) = payload.as_object_mut() {
                map.insert("data".into(), previous_state);
            }
            (name, payload)
        }
        OperationType::Modify => {
            let name = substitute(tool_name, &write_or_modify(), "restore")?;
            let mut payload = args.clone();
            if let Some(map) = payload.as_object_mut() {
                map.insert("content".into(), previous_state);
            }
            (name, payload)
        }
        _ => return None,
    };

    if !hub.has_tool(server_name, &paired_name) {
        return None;
    }
    Some((paired_name, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_pairs_with_create() {
        let pattern = delete_or_remove();
        assert_eq!(
            substitute("delete_repo", &pattern, "create"),
            Some("create_repo".to_string())
        );
    }

    #[test]
    fn modify_pairs_with_restore() {
        let pattern = write_or_modify();
        assert_eq!(
            substitute("modify_file", &pattern, "restore"),
            Some("restore_file".to_string())
        );
    }

    #[test]
    fn non_mutating_operation_has_no_probe_substitution() {
        let pattern = delete_or_modify();
        assert_eq!(substitute("list_repos", &pattern, "get"), None);
    }
}
