//! §4.6.a: danger classification and confirmation-required decision.

use hub_config::SafetyConfig;
use hub_core::{DangerLevel, OperationType, ToolDescriptor};
use regex::Regex;

const DEFAULT_DANGEROUS_KEYWORDS: &[&str] = &[
    "delete", "remove", "drop", "truncate", "push", "write", "modify", "update", "alter", "exec",
    "execute", "format",
];

fn delete_pattern() -> Regex {
    Regex::new(r"(?i)delete|remove|drop").unwrap()
}

fn modify_pattern() -> Regex {
    Regex::new(r"(?i)modify|update|alter").unwrap()
}

fn execute_pattern() -> Regex {
    Regex::new(r"(?i)exec|execute|run").unwrap()
}

fn write_pattern() -> Regex {
    Regex::new(r"(?i)write|create|push").unwrap()
}

fn format_pattern() -> Regex {
    Regex::new(r"(?i)format|clean|clear").unwrap()
}

/// First matching pattern in the fixed order DELETE → WRITE → MODIFY →
/// EXECUTE → FORMAT wins; see `spec.md` §9 for why this order and not another.
pub fn classify_operation(tool_name: &str) -> OperationType {
    if delete_pattern().is_match(tool_name) {
        OperationType::Delete
    } else if write_pattern().is_match(tool_name) {
        OperationType::Write
    } else if modify_pattern().is_match(tool_name) {
        OperationType::Modify
    } else if execute_pattern().is_match(tool_name) {
        OperationType::Execute
    } else if format_pattern().is_match(tool_name) {
        OperationType::Format
    } else {
        OperationType::Modify
    }
}

/// Whether `descriptor` counts as dangerous, per the union of signals in
/// §4.6.a: explicit safety flags, keyword match on the name, or a required
/// field named in the safety config's `dangerousFields`.
pub fn is_dangerous(descriptor: &ToolDescriptor, safety: &SafetyConfig) -> bool {
    if let Some(safety_info) = &descriptor.safety {
        if safety_info.is_dangerous == Some(true) {
            return true;
        }
        if let Some(level) = safety_info.danger_level {
            if level != DangerLevel::None {
                return true;
            }
        }
    }

    let name = descriptor.name.to_lowercase();
    let keyword_hit = DEFAULT_DANGEROUS_KEYWORDS
        .iter()
        .chain(safety.dangerous_keywords.iter().map(String::as_str))
        .any(|keyword| name.contains(keyword));
    if keyword_hit {
        return true;
    }

    descriptor
        .input_schema
        .required
        .iter()
        .any(|field| safety.dangerous_fields.contains(field))
}

/// Danger level follows the descriptor's explicit value when present,
/// otherwise is derived from the tool name.
pub fn danger_level(descriptor: &ToolDescriptor, dangerous: bool) -> DangerLevel {
    if let Some(safety) = &descriptor.safety {
        if let Some(level) = safety.danger_level {
            return level;
        }
    }
    if !dangerous {
        return DangerLevel::None;
    }
    let name = &descriptor.name;
    if delete_pattern().is_match(name) {
        DangerLevel::High
    } else if modify_pattern().is_match(name) || execute_pattern().is_match(name) {
        DangerLevel::Medium
    } else {
        DangerLevel::Low
    }
}

/// §4.6.a, priority order: explicit descriptor flag, configured danger
/// levels, name patterns, explicit tool list, then "any dangerous tool".
pub fn requires_confirmation(
    descriptor: &ToolDescriptor,
    dangerous: bool,
    level: DangerLevel,
    safety: &SafetyConfig,
) -> bool {
    if let Some(flag) = descriptor.safety.as_ref().and_then(|s| s.requires_confirmation) {
        return flag;
    }
    let required = &safety.confirmation_required;
    if required.danger_levels.contains(&level) {
        return true;
    }
    if required
        .patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .any(|re| re.is_match(&descriptor.name))
    {
        return true;
    }
    if required.tools.contains(&descriptor.name) {
        return true;
    }
    dangerous
}
