//! C6: the Tool Executor — validation, danger classification, optional
//! LLM-assisted completion, dispatch, and best-effort rollback.

mod danger;
mod executor;
mod llm;
mod rollback;
mod validate;

pub use danger::{classify_operation, danger_level, is_dangerous, requires_confirmation};
pub use executor::{AlwaysConfirm, ExecuteResult, ToolExecutor, UserConfirmation};
pub use llm::{build_prompt, deterministic_fallback, CompletionPrompt, CompletionResponse, LlmCompleter, MissingFieldContext};
