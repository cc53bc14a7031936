//! §4.6.c: required-field validation and default injection.

use hub_core::ToolDescriptor;
use serde_json::Value;

/// Outcome of one validation pass over a call's arguments.
pub struct ValidationOutcome {
    pub args: Value,
    pub missing_fields: Vec<String>,
}

/// For each required field: keep a caller-supplied value, else inject a
/// default found at `config.tools.<tool>.<field>` then `config.<field>`,
/// else record it as missing.
pub fn validate_and_enrich(descriptor: &ToolDescriptor, args: Value, config: &Value, tool_name: &str) -> ValidationOutcome {
    let mut args = match args {
        Value::Object(map) => Value::Object(map),
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    let mut missing_fields = Vec::new();

    for field in &descriptor.input_schema.required {
        let has_value = args.get(field).is_some_and(|v| !v.is_null());
        if has_value {
            continue;
        }

        let default = config
            .get("tools")
            .and_then(|tools| tools.get(tool_name))
            .and_then(|tool_cfg| tool_cfg.get(field))
            .or_else(|| config.get(field));

        match default {
            Some(value) => {
                if let Some(map) = args.as_object_mut() {
                    map.insert(field.clone(), value.clone());
                }
            }
            None => missing_fields.push(field.clone()),
        }
    }

    ValidationOutcome {
        args,
        missing_fields,
    }
}
