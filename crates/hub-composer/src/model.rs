//! C7 data model: composed tool definitions and their execution results.

use std::collections::HashMap;

use hub_core::InputSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A reference to either a caller-supplied parameter or an earlier step's
/// output, substituted into a step's resolved input (`spec.md` §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ParamRef {
    /// `params.<path>`.
    Param { path: String },
    /// `steps.<stepName>.outputs.<path>`.
    Output { step_name: String, path: String },
}

/// One field of a step's `input` map: either a literal value or a
/// `ParamRef` to be resolved at execution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Ref(ParamRef),
    Literal(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionType {
    Success,
    Failure,
    Expression,
}

/// A step's optional `condition` (§4.7.a).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    /// Named step this condition refers to; required for `success`/`failure`.
    #[serde(default)]
    pub step_name: Option<String>,
    /// Free-form expression source, used only when `type = expression`.
    #[serde(default)]
    pub expression: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub server: String,
    pub tool: String,
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub input: HashMap<String, InputValue>,
    /// Key under which this step's result is stored in `outputs`, if any.
    #[serde(default)]
    pub output: Option<String>,
    /// Compensating call issued (LIFO) if a later step fails.
    #[serde(default)]
    pub rollback: Option<RollbackSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackSpec {
    pub server: String,
    pub tool: String,
    #[serde(default)]
    pub input: HashMap<String, InputValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposedTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    pub steps: Vec<Step>,
    /// Declared shape of `params`, validated at `executeTool` step 1
    /// (`spec.md` §4.7, §3).
    #[serde(rename = "inputSchema", default)]
    pub input_schema: InputSchema,
    #[serde(rename = "outputSchema", default)]
    pub output_schema: Option<InputSchema>,
    #[serde(default)]
    pub metadata: Value,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub name: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackInfo {
    pub triggered: bool,
    pub successful: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComposedResult {
    pub success: bool,
    pub tool_name: String,
    pub step_results: Vec<StepResult>,
    pub outputs: HashMap<String, Value>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_info: Option<RollbackInfo>,
}
