//! §4.7.a: step condition evaluation.

use std::collections::HashMap;

use hub_core::HubError;

use crate::model::{Condition, ConditionType, StepStatus};

/// Evaluates `condition` against the status of steps executed so far.
/// `step_position` maps every step name to its declaration index so a
/// condition naming a not-yet-reached step can be rejected as a
/// `ForwardReference` rather than silently treated as "not run yet".
pub fn evaluate(
    condition: &Condition,
    current_index: usize,
    step_position: &HashMap<String, usize>,
    completed: &HashMap<String, StepStatus>,
) -> Result<bool, HubError> {
    match condition.condition_type {
        ConditionType::Expression => {
            if let Some(step_name) = &condition.step_name {
                check_not_forward(step_name, current_index, step_position)?;
            }
            // No general expression language is implemented; per the
            // design note, this evaluator always returns true but does so
            // deterministically.
            Ok(true)
        }
        ConditionType::Success | ConditionType::Failure => {
            let step_name = condition.step_name.as_ref().ok_or_else(|| {
                HubError::ValidationError(
                    "composed tool".to_string(),
                    "success/failure condition requires a stepName".to_string(),
                )
            })?;
            check_not_forward(step_name, current_index, step_position)?;

            let status = completed.get(step_name);
            let expected = match condition.condition_type {
                ConditionType::Success => StepStatus::Success,
                ConditionType::Failure => StepStatus::Failed,
                ConditionType::Expression => unreachable!(),
            };
            Ok(status == Some(&expected))
        }
    }
}

fn check_not_forward(
    step_name: &str,
    current_index: usize,
    step_position: &HashMap<String, usize>,
) -> Result<(), HubError> {
    match step_position.get(step_name) {
        Some(&position) if position < current_index => Ok(()),
        _ => Err(HubError::ForwardReference {
            step_name: step_name.to_string(),
            referenced: step_name.to_string(),
        }),
    }
}
