//! §4.6.d: optional LLM-assisted completion of missing required fields.

use async_trait::async_trait;
use hub_core::{FieldSchema, ToolDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One missing field, described for the prompt with whatever schema
/// metadata is available plus any syntactically related current arg.
#[derive(Debug, Clone, Serialize)]
pub struct MissingFieldContext {
    pub name: String,
    pub schema: Option<FieldSchema>,
    pub related_current_value: Option<Value>,
}

/// The structured prompt built for one completion attempt.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionPrompt {
    pub tool_name: String,
    pub tool_description: Option<String>,
    pub current_arguments: Value,
    pub missing_fields: Vec<MissingFieldContext>,
    pub attempt: u32,
}

/// The LLM's structured reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub provided_values: serde_json::Map<String, Value>,
    #[serde(default)]
    pub should_prompt_user: bool,
    #[serde(default)]
    pub user_prompt: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Injected completion backend. Production callers wire this to an actual
/// model; tests use a scripted stub.
#[async_trait]
pub trait LlmCompleter: Send + Sync {
    async fn complete(&self, prompt: CompletionPrompt) -> anyhow::Result<CompletionResponse>;
}

/// Builds the structured prompt for one attempt, per §4.6.d: each missing
/// field carries its schema plus any current-arg value whose key looks
/// related (shares a prefix or suffix with the missing field's name).
pub fn build_prompt(
    descriptor: &ToolDescriptor,
    current_arguments: &Value,
    missing_fields: &[String],
    attempt: u32,
) -> CompletionPrompt {
    let contexts = missing_fields
        .iter()
        .map(|field| MissingFieldContext {
            name: field.clone(),
            schema: descriptor.input_schema.properties.get(field).cloned(),
            related_current_value: related_value(current_arguments, field),
        })
        .collect();

    CompletionPrompt {
        tool_name: descriptor.name.clone(),
        tool_description: descriptor.description.clone(),
        current_arguments: current_arguments.clone(),
        missing_fields: contexts,
        attempt,
    }
}

fn related_value(current_arguments: &Value, field: &str) -> Option<Value> {
    let map = current_arguments.as_object()?;
    map.iter()
        .find(|(key, _)| key.contains(field.as_str()) || field.contains(key.as_str()))
        .map(|(_, value)| value.clone())
}

/// Deterministic fallback used when the LLM call errors or its reply fails
/// to parse: always prompts the user, listing each missing field by name.
pub fn deterministic_fallback(missing_fields: &[String]) -> CompletionResponse {
    let listed = missing_fields.join(", ");
    CompletionResponse {
        provided_values: serde_json::Map::new(),
        should_prompt_user: true,
        user_prompt: Some(format!("Please provide values for: {listed}")),
        reasoning: None,
    }
}
