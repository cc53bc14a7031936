//! §4.7 `registerTool` validation: uniqueness, referential integrity,
//! `ParamRef` ordering, and acyclicity.

use std::collections::{HashMap, HashSet};

use hub_core::HubError;
use tool_hub::Hub;

use crate::model::{ComposedTool, InputValue, ParamRef, Step};

pub fn validate(tool: &ComposedTool, hub: &Hub) -> Result<(), HubError> {
    check_unique_names(tool)?;
    check_referential_integrity(tool, hub)?;
    check_param_ref_ordering(tool)?;
    check_acyclic(tool)?;
    Ok(())
}

fn check_unique_names(tool: &ComposedTool) -> Result<(), HubError> {
    let mut seen = HashSet::new();
    for step in &tool.steps {
        if !seen.insert(step.name.as_str()) {
            return Err(HubError::ValidationError(
                tool.name.clone(),
                format!("duplicate step name '{}'", step.name),
            ));
        }
    }
    Ok(())
}

fn check_referential_integrity(tool: &ComposedTool, hub: &Hub) -> Result<(), HubError> {
    for step in &tool.steps {
        if !hub.has_tool(&step.server, &step.tool) {
            return Err(HubError::ValidationError(
                tool.name.clone(),
                format!("step '{}' references unknown tool '{}/{}'", step.name, step.server, step.tool),
            ));
        }
        if let Some(rollback) = &step.rollback {
            if !hub.has_tool(&rollback.server, &rollback.tool) {
                return Err(HubError::ValidationError(
                    tool.name.clone(),
                    format!(
                        "step '{}' rollback references unknown tool '{}/{}'",
                        step.name, rollback.server, rollback.tool
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Every `ParamRef::Output` must name a step that precedes the referrer in
/// declaration order, with a non-empty dotted path.
fn check_param_ref_ordering(tool: &ComposedTool) -> Result<(), HubError> {
    let position: HashMap<&str, usize> = tool
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();

    for (index, step) in tool.steps.iter().enumerate() {
        for value in step.input.values() {
            if let InputValue::Ref(ParamRef::Output { step_name, path }) = value {
                if path.trim().is_empty() {
                    return Err(HubError::SchemaCompatibility {
                        step: step.name.clone(),
                        path: path.clone(),
                    });
                }
                match position.get(step_name.as_str()) {
                    Some(&referenced_index) if referenced_index < index => {}
                    _ => {
                        return Err(HubError::ValidationError(
                            tool.name.clone(),
                            format!(
                                "step '{}' references output of non-earlier step '{}'",
                                step.name, step_name
                            ),
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}

/// DFS with a recursion-path set; self-reference is rejected outright.
fn check_acyclic(tool: &ComposedTool) -> Result<(), HubError> {
    let edges = output_edges(tool);
    let mut visited = HashSet::new();
    let mut in_progress = HashSet::new();
    let mut path = Vec::new();

    for step in &tool.steps {
        if !visited.contains(step.name.as_str()) {
            visit(&step.name, &edges, &mut visited, &mut in_progress, &mut path, tool)?;
        }
    }
    Ok(())
}

fn output_edges(tool: &ComposedTool) -> HashMap<String, Vec<String>> {
    let mut edges: HashMap<String, Vec<String>> = HashMap::new();
    for step in &tool.steps {
        let targets = edges.entry(step.name.clone()).or_default();
        for value in step.input.values() {
            if let InputValue::Ref(ParamRef::Output { step_name, .. }) = value {
                targets.push(step_name.clone());
            }
        }
    }
    edges
}

fn visit<'a>(
    name: &'a str,
    edges: &'a HashMap<String, Vec<String>>,
    visited: &mut HashSet<String>,
    in_progress: &mut HashSet<String>,
    path: &mut Vec<String>,
    tool: &ComposedTool,
) -> Result<(), HubError> {
    in_progress.insert(name.to_string());
    path.push(name.to_string());

    if let Some(targets) = edges.get(name) {
        for target in targets {
            if target == name {
                return Err(cycle_error(tool, path, target));
            }
            if in_progress.contains(target) {
                return Err(cycle_error(tool, path, target));
            }
            if !visited.contains(target) {
                visit(target, edges, visited, in_progress, path, tool)?;
            }
        }
    }

    path.pop();
    in_progress.remove(name);
    visited.insert(name.to_string());
    Ok(())
}

fn cycle_error(tool: &ComposedTool, path: &[String], closing: &str) -> HubError {
    let mut full_path = path.to_vec();
    full_path.push(closing.to_string());
    HubError::CircularDependency {
        tool: tool.name.clone(),
        path: full_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComposedTool, InputValue, ParamRef, Step};
    use std::collections::HashMap as Map;

    fn step(name: &str, output: Option<&str>, refs: Vec<(&str, &str, &str)>) -> Step {
        let mut input = Map::new();
        for (field, step_name, path) in refs {
            input.insert(
                field.to_string(),
                InputValue::Ref(ParamRef::Output {
                    step_name: step_name.to_string(),
                    path: path.to_string(),
                }),
            );
        }
        Step {
            name: name.to_string(),
            server: "gh".to_string(),
            tool: "noop".to_string(),
            condition: None,
            input,
            output: output.map(str::to_string),
            rollback: None,
        }
    }

    #[test]
    fn duplicate_step_names_rejected() {
        let tool = ComposedTool {
            name: "t".into(),
            description: None,
            steps: vec![step("a", None, vec![]), step("a", None, vec![])],
            ..Default::default()
        };
        assert!(check_unique_names(&tool).is_err());
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let tool = ComposedTool {
            name: "t".into(),
            description: None,
            steps: vec![step("a", Some("out"), vec![("x", "a", "out")])],
            ..Default::default()
        };
        assert!(check_acyclic(&tool).is_err());
    }

    #[test]
    fn forward_reference_fails_ordering_check() {
        let tool = ComposedTool {
            name: "t".into(),
            description: None,
            steps: vec![
                step("a", Some("out"), vec![("x", "b", "out")]),
                step("b", Some("out"), vec![]),
            ],
            ..Default::default()
        };
        assert!(check_param_ref_ordering(&tool).is_err());
    }

    #[test]
    fn valid_chain_passes_acyclicity() {
        let tool = ComposedTool {
            name: "t".into(),
            description: None,
            steps: vec![
                step("a", Some("repo"), vec![]),
                step("b", Some("out"), vec![("repo", "a", "repo")]),
            ],
            ..Default::default()
        };
        assert!(check_acyclic(&tool).is_ok());
        assert!(check_param_ref_ordering(&tool).is_ok());
    }
}
