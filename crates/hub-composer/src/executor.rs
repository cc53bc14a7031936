//! C7 `executeTool`: walks a composed tool's steps in declaration order,
//! resolving parameters, honoring conditions, and draining a rollback stack
//! LIFO on the first step failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use hub_core::HubError;
use serde_json::Value;
use tool_hub::Hub;

use crate::condition::evaluate as evaluate_condition;
use crate::model::{
    ComposedResult, ComposedTool, RollbackInfo, RollbackSpec, Step, StepResult, StepStatus,
};
use crate::resolve::{resolve_input, StepOutcome};

struct PendingRollback {
    server: String,
    tool: String,
    input: Value,
}

/// Executes `tool` against `params`. `hub.callTool` is invoked directly
/// (not through the Tool Executor's validation/danger pipeline) — composed
/// steps are declared ahead of time by an operator, not assembled from
/// free-form user input (`spec.md` §4.7).
pub async fn execute(hub: &Hub, tool: &ComposedTool, params: Value) -> ComposedResult {
    let started = Instant::now();
    let step_position: HashMap<String, usize> = tool
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.clone(), i))
        .collect();

    let mut statuses: HashMap<String, StepStatus> = HashMap::new();
    let mut outcomes: HashMap<String, StepOutcome> = HashMap::new();
    let mut outputs: HashMap<String, Value> = HashMap::new();
    let mut step_results = Vec::with_capacity(tool.steps.len());
    let mut rollback_stack: Vec<PendingRollback> = Vec::new();
    let mut failed = false;

    for (index, step) in tool.steps.iter().enumerate() {
        let step_started = Instant::now();

        if let Some(condition) = &step.condition {
            match evaluate_condition(condition, index, &step_position, &statuses) {
                Ok(true) => {}
                Ok(false) => {
                    statuses.insert(step.name.clone(), StepStatus::Skipped);
                    outcomes.insert(
                        step.name.clone(),
                        StepOutcome {
                            status: StepStatus::Skipped,
                            output: None,
                        },
                    );
                    step_results.push(StepResult {
                        name: step.name.clone(),
                        status: StepStatus::Skipped,
                        result: None,
                        error: None,
                        duration_ms: elapsed_ms(step_started),
                    });
                    continue;
                }
                Err(error) => {
                    statuses.insert(step.name.clone(), StepStatus::Failed);
                    step_results.push(StepResult {
                        name: step.name.clone(),
                        status: StepStatus::Failed,
                        result: None,
                        error: Some(error.to_string()),
                        duration_ms: elapsed_ms(step_started),
                    });
                    failed = true;
                    break;
                }
            }
        }

        let resolved_input = match resolve_input(step, &params, &outcomes) {
            Ok(value) => value,
            Err(error) => {
                statuses.insert(step.name.clone(), StepStatus::Failed);
                step_results.push(StepResult {
                    name: step.name.clone(),
                    status: StepStatus::Failed,
                    result: None,
                    error: Some(error.to_string()),
                    duration_ms: elapsed_ms(step_started),
                });
                failed = true;
                break;
            }
        };

        match hub.call_tool(&step.server, &step.tool, resolved_input).await {
            Ok(result) => {
                statuses.insert(step.name.clone(), StepStatus::Success);
                if let Some(output_key) = &step.output {
                    outputs.insert(output_key.clone(), result.clone());
                }
                outcomes.insert(
                    step.name.clone(),
                    StepOutcome {
                        status: StepStatus::Success,
                        output: Some(result.clone()),
                    },
                );
                if let Some(rollback) = &step.rollback {
                    if let Some(pending) = resolve_rollback(rollback, &params, &outcomes) {
                        rollback_stack.push(pending);
                    }
                }
                step_results.push(StepResult {
                    name: step.name.clone(),
                    status: StepStatus::Success,
                    result: Some(result),
                    error: None,
                    duration_ms: elapsed_ms(step_started),
                });
            }
            Err(error) => {
                statuses.insert(step.name.clone(), StepStatus::Failed);
                outcomes.insert(
                    step.name.clone(),
                    StepOutcome {
                        status: StepStatus::Failed,
                        output: None,
                    },
                );
                step_results.push(StepResult {
                    name: step.name.clone(),
                    status: StepStatus::Failed,
                    result: None,
                    error: Some(error.to_string()),
                    duration_ms: elapsed_ms(step_started),
                });
                failed = true;
                break;
            }
        }
    }

    let rollback_info = if failed {
        Some(drain_rollback(hub, rollback_stack).await)
    } else {
        None
    };

    ComposedResult {
        success: !failed,
        tool_name: tool.name.clone(),
        step_results,
        outputs,
        duration_ms: elapsed_ms(started),
        rollback_info,
    }
}

fn resolve_rollback(
    spec: &RollbackSpec,
    params: &Value,
    outcomes: &HashMap<String, StepOutcome>,
) -> Option<PendingRollback> {
    let as_step = Step {
        name: "<rollback>".to_string(),
        server: spec.server.clone(),
        tool: spec.tool.clone(),
        condition: None,
        input: spec.input.clone(),
        output: None,
        rollback: None,
    };
    let input = resolve_input(&as_step, params, outcomes).ok()?;
    Some(PendingRollback {
        server: spec.server.clone(),
        tool: spec.tool.clone(),
        input,
    })
}

/// Drains the rollback stack LIFO; a compensator failure does not stop the
/// drain (`spec.md` §4.7 step 3).
async fn drain_rollback(hub: &Hub, mut stack: Vec<PendingRollback>) -> RollbackInfo {
    let mut all_ok = true;
    let mut first_error = None;
    while let Some(pending) = stack.pop() {
        if let Err(error) = hub.call_tool(&pending.server, &pending.tool, pending.input).await {
            all_ok = false;
            if first_error.is_none() {
                first_error = Some(error.to_string());
            }
        }
    }
    RollbackInfo {
        triggered: true,
        successful: all_ok,
        error: first_error,
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Validates `params` against the tool's declared input schema: must be an
/// object (or absent), and every `inputSchema.required` field must be
/// present with a non-null value. No default injection happens here, unlike
/// `hub_executor::validate::validate_and_enrich` — a composed tool's params
/// are either supplied by the caller or missing (`spec.md` §4.7 step 1).
pub fn validate_params(tool: &ComposedTool, params: &Value) -> Result<(), HubError> {
    if !params.is_object() && !params.is_null() {
        return Err(HubError::ValidationError(
            tool.name.clone(),
            "params must be a JSON object".to_string(),
        ));
    }

    let mut missing = Vec::new();
    for field in &tool.input_schema.required {
        let has_value = params.get(field).is_some_and(|v| !v.is_null());
        if !has_value {
            missing.push(field.clone());
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(HubError::ValidationError(
            tool.name.clone(),
            format!("missing required field(s): {}", missing.join(", ")),
        ))
    }
}

pub async fn execute_checked(hub: &Hub, tool: &ComposedTool, params: Value) -> Result<ComposedResult, HubError> {
    validate_params(tool, &params)?;
    Ok(execute(hub, tool, params).await)
}

/// Registry of composed tools, owned by the binary and shared via
/// `hub_core::registry` for hot-reload stability (`spec.md` §9).
pub struct Composer {
    hub: Arc<Hub>,
    tools: std::sync::RwLock<HashMap<String, ComposedTool>>,
}

impl Composer {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self {
            hub,
            tools: std::sync::RwLock::new(HashMap::new()),
        }
    }

    pub fn register_tool(&self, tool: ComposedTool) -> Result<(), HubError> {
        crate::validate::validate(&tool, &self.hub)?;
        self.tools
            .write()
            .expect("composer registry lock poisoned")
            .insert(tool.name.clone(), tool);
        Ok(())
    }

    pub async fn execute_tool(&self, name: &str, params: Value) -> Result<ComposedResult, HubError> {
        let tool = self
            .tools
            .read()
            .expect("composer registry lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| HubError::ValidationError(name.to_string(), "no such composed tool".to_string()))?;
        execute_checked(&self.hub, &tool, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InputValue, ParamRef};
    use serde_json::json;
    use std::collections::HashMap as Map;

    fn param_step(name: &str, output: Option<&str>) -> Step {
        Step {
            name: name.to_string(),
            server: "gh".into(),
            tool: "noop".into(),
            condition: None,
            input: Map::new(),
            output: output.map(str::to_string),
            rollback: None,
        }
    }

    #[test]
    fn validate_params_rejects_missing_required_field() {
        let tool = ComposedTool {
            name: "needs-repo".into(),
            description: None,
            steps: vec![],
            input_schema: hub_core::InputSchema {
                properties: Default::default(),
                required: vec!["repo".into()],
            },
            ..Default::default()
        };
        let err = validate_params(&tool, &json!({})).unwrap_err();
        assert!(matches!(err, HubError::ValidationError(_, msg) if msg.contains("repo")));
        assert!(validate_params(&tool, &json!({"repo": "x"})).is_ok());
    }

    #[tokio::test]
    async fn empty_tool_succeeds_trivially() {
        let hub = Arc::new(Hub::initialize(vec![]).await);
        let tool = ComposedTool {
            name: "noop-tool".into(),
            description: None,
            steps: vec![],
            ..Default::default()
        };
        let result = execute(&hub, &tool, json!({})).await;
        assert!(result.success);
        assert!(result.rollback_info.is_none());
    }

    #[tokio::test]
    async fn step_referencing_unresolvable_output_fails_before_dispatch() {
        let hub = Arc::new(Hub::initialize(vec![]).await);
        let mut step = param_step("b", None);
        step.input.insert(
            "repo".into(),
            InputValue::Ref(ParamRef::Output {
                step_name: "a".into(),
                path: "repo".into(),
            }),
        );
        let tool = ComposedTool {
            name: "chain".into(),
            description: None,
            steps: vec![step],
            ..Default::default()
        };
        let result = execute(&hub, &tool, json!({})).await;
        assert!(!result.success);
        assert_eq!(result.step_results[0].status, StepStatus::Failed);
    }
}
