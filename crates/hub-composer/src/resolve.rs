//! §4.7 step 2.b: resolves a step's declared `input` map against `params`
//! and prior steps' recorded outputs.

use std::collections::HashMap;

use hub_core::HubError;
use serde_json::Value;

use crate::model::{InputValue, ParamRef, Step, StepStatus};

/// Record of one already-executed step's outcome, as far as resolution
/// needs to know.
pub struct StepOutcome {
    pub status: StepStatus,
    pub output: Option<Value>,
}

pub fn resolve_input(
    step: &Step,
    params: &Value,
    outcomes: &HashMap<String, StepOutcome>,
) -> Result<Value, HubError> {
    let mut resolved = serde_json::Map::new();
    for (field, value) in &step.input {
        let resolved_value = match value {
            InputValue::Literal(literal) => literal.clone(),
            InputValue::Ref(ParamRef::Param { path }) => {
                get_path(params, path).unwrap_or(Value::Null)
            }
            InputValue::Ref(ParamRef::Output { step_name, path }) => {
                let outcome = outcomes.get(step_name);
                match outcome {
                    Some(outcome) if outcome.status == StepStatus::Success => {
                        let output = outcome.output.clone().unwrap_or(Value::Null);
                        get_path(&output, path).unwrap_or(Value::Null)
                    }
                    _ => {
                        return Err(HubError::ReferenceUnavailable {
                            step_name: step.name.clone(),
                            referenced: step_name.clone(),
                        });
                    }
                }
            }
        };
        resolved.insert(field.clone(), resolved_value);
    }
    Ok(Value::Object(resolved))
}

fn get_path(value: &Value, path: &str) -> Option<Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Step;
    use serde_json::json;
    use std::collections::HashMap as Map;

    fn step_with_refs(refs: Vec<(&str, InputValue)>) -> Step {
        let mut input = Map::new();
        for (field, value) in refs {
            input.insert(field.to_string(), value);
        }
        Step {
            name: "b".into(),
            server: "gh".into(),
            tool: "push_files".into(),
            condition: None,
            input,
            output: None,
            rollback: None,
        }
    }

    #[test]
    fn param_ref_resolves_from_params() {
        let step = step_with_refs(vec![(
            "msg",
            InputValue::Ref(ParamRef::Param { path: "text".into() }),
        )]);
        let params = json!({"text": "hello"});
        let resolved = resolve_input(&step, &params, &HashMap::new()).unwrap();
        assert_eq!(resolved["msg"], "hello");
    }

    #[test]
    fn output_ref_resolves_from_successful_step() {
        let step = step_with_refs(vec![(
            "repo",
            InputValue::Ref(ParamRef::Output {
                step_name: "a".into(),
                path: "repo".into(),
            }),
        )]);
        let mut outcomes = HashMap::new();
        outcomes.insert(
            "a".to_string(),
            StepOutcome {
                status: StepStatus::Success,
                output: Some(json!({"repo": "octo/hello"})),
            },
        );
        let resolved = resolve_input(&step, &json!({}), &outcomes).unwrap();
        assert_eq!(resolved["repo"], "octo/hello");
    }

    #[test]
    fn output_ref_to_failed_step_is_reference_unavailable() {
        let step = step_with_refs(vec![(
            "repo",
            InputValue::Ref(ParamRef::Output {
                step_name: "a".into(),
                path: "repo".into(),
            }),
        )]);
        let mut outcomes = HashMap::new();
        outcomes.insert(
            "a".to_string(),
            StepOutcome {
                status: StepStatus::Failed,
                output: None,
            },
        );
        let err = resolve_input(&step, &json!({}), &outcomes).unwrap_err();
        assert!(matches!(err, HubError::ReferenceUnavailable { .. }));
    }
}
