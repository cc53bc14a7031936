//! C6: validates, classifies, dispatches, and (on failure) rolls back one
//! tool call. See `spec.md` §4.6 for the full algorithm this follows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hub_config::ToolExecutorConfig;
use hub_core::{HubError, OperationType, ServerContext};
use serde_json::Value;
use tool_hub::Hub;

use crate::danger::{danger_level, is_dangerous, requires_confirmation};
use crate::llm::{build_prompt, deterministic_fallback, CompletionResponse, LlmCompleter};
use crate::rollback::{capture_previous_state, paired_rollback_call};
use crate::validate::validate_and_enrich;

/// Retry back-off between failed dispatch attempts (`spec.md` §5).
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Injected confirmation gate for dangerous calls.
#[async_trait]
pub trait UserConfirmation: Send + Sync {
    async fn confirm(&self, server_name: &str, tool_name: &str, args: &Value) -> bool;
}

/// A confirmation hook that always approves; the default when no interactive
/// surface is wired up.
pub struct AlwaysConfirm;

#[async_trait]
impl UserConfirmation for AlwaysConfirm {
    async fn confirm(&self, _server_name: &str, _tool_name: &str, _args: &Value) -> bool {
        true
    }
}

/// Result shape of `executeTool`, §4.6.e. Never surfaces a `Result::Err`
/// except for programmer errors (unconfigured server, missing descriptor).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecuteResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_error: Option<String>,
}

impl ExecuteResult {
    fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            missing_fields: Vec::new(),
            rollback_error: None,
        }
    }

    fn failed(error: impl ToString) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.to_string()),
            missing_fields: Vec::new(),
            rollback_error: None,
        }
    }

    fn missing(fields: Vec<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: None,
            missing_fields: fields,
            rollback_error: None,
        }
    }
}

pub struct ToolExecutor {
    hub: Arc<Hub>,
    config: ToolExecutorConfig,
    confirmation: Arc<dyn UserConfirmation>,
    llm: Option<Arc<dyn LlmCompleter>>,
    server_contexts: HashMap<String, ServerContext>,
}

impl ToolExecutor {
    pub fn new(
        hub: Arc<Hub>,
        config: ToolExecutorConfig,
        confirmation: Arc<dyn UserConfirmation>,
        llm: Option<Arc<dyn LlmCompleter>>,
    ) -> Self {
        Self::with_server_contexts(hub, config, confirmation, llm, HashMap::new())
    }

    /// As `new`, but also takes the per-server `ServerContext` map (§4.6.c's
    /// `serverContext.config` default source, §6's "per-server default
    /// argument maps") the executor consults during validation/enrichment.
    pub fn with_server_contexts(
        hub: Arc<Hub>,
        config: ToolExecutorConfig,
        confirmation: Arc<dyn UserConfirmation>,
        llm: Option<Arc<dyn LlmCompleter>>,
        server_contexts: HashMap<String, ServerContext>,
    ) -> Self {
        Self {
            hub,
            config,
            confirmation,
            llm,
            server_contexts,
        }
    }

    /// §4.6's six-step algorithm.
    pub async fn execute_tool(&self, server_name: &str, tool_name: &str, arguments: Value) -> ExecuteResult {
        let descriptor = match self.hub.tool_descriptor(server_name, tool_name) {
            Ok(descriptor) => descriptor,
            Err(error) => return ExecuteResult::failed(error),
        };

        let safety = &self.config.safety_config;
        let dangerous = is_dangerous(&descriptor, safety);
        let level = danger_level(&descriptor, dangerous);
        let operation = crate::danger::classify_operation(tool_name);

        let previous_state = if dangerous {
            capture_previous_state(&self.hub, server_name, tool_name, &arguments, operation).await
        } else {
            None
        };

        if requires_confirmation(&descriptor, dangerous, level, safety) {
            let approved = self.confirmation.confirm(server_name, tool_name, &arguments).await;
            if !approved {
                return ExecuteResult {
                    ok: false,
                    data: None,
                    error: Some(HubError::UserDenied {
                        server: server_name.to_string(),
                        tool: tool_name.to_string(),
                    }
                    .to_string()),
                    missing_fields: Vec::new(),
                    rollback_error: None,
                };
            }
        }

        let args = match self.validate_with_completion(&descriptor, arguments, server_name, tool_name).await {
            Ok(args) => args,
            Err(missing_fields) => return ExecuteResult::missing(missing_fields),
        };

        match self.dispatch_with_retry(server_name, tool_name, args.clone()).await {
            Ok(data) => ExecuteResult::ok(data),
            Err(error) => {
                let mut result = ExecuteResult::failed(&error);
                if let Some(previous_state) = previous_state {
                    if let Err(rollback_error) = self
                        .attempt_rollback(server_name, tool_name, &args, operation, previous_state)
                        .await
                    {
                        result.rollback_error = Some(rollback_error);
                    }
                }
                result
            }
        }
    }

    /// §4.6.c/d: validates required fields, looping through LLM-assisted
    /// completion (when enabled) until valid or `maxRetries` is exhausted.
    async fn validate_with_completion(
        &self,
        descriptor: &hub_core::ToolDescriptor,
        mut arguments: Value,
        server_name: &str,
        tool_name: &str,
    ) -> Result<Value, Vec<String>> {
        let server_config = self
            .server_contexts
            .get(server_name)
            .map(|ctx| ctx.config.clone())
            .unwrap_or_else(|| serde_json::json!({}));
        let mut attempt = 0;

        loop {
            let outcome = validate_and_enrich(descriptor, arguments.clone(), &server_config, tool_name);
            arguments = outcome.args;
            if outcome.missing_fields.is_empty() {
                return Ok(arguments);
            }

            if !self.config.llm_enabled || attempt >= self.config.max_retries {
                return Err(outcome.missing_fields);
            }

            attempt += 1;
            let prompt = build_prompt(descriptor, &arguments, &outcome.missing_fields, attempt);
            let response = self.run_completion(prompt).await;

            if let Some(map) = arguments.as_object_mut() {
                for (key, value) in response.provided_values {
                    map.insert(key, value);
                }
            }

            let reassessed = validate_and_enrich(descriptor, arguments.clone(), &server_config, tool_name);
            arguments = reassessed.args;
            if reassessed.missing_fields.is_empty() {
                return Ok(arguments);
            }
            // Forced shouldPromptUser=true per spec §4.6.d: a reassessment
            // that is still invalid stops the loop rather than retrying.
            return Err(reassessed.missing_fields);
        }
    }

    async fn run_completion(&self, prompt: crate::llm::CompletionPrompt) -> CompletionResponse {
        let missing: Vec<String> = prompt.missing_fields.iter().map(|f| f.name.clone()).collect();
        match &self.llm {
            Some(llm) => match llm.complete(prompt).await {
                Ok(response) => response,
                Err(error) => {
                    tracing::warn!(%error, "LLM completion call failed, falling back to user prompt");
                    deterministic_fallback(&missing)
                }
            },
            None => deterministic_fallback(&missing),
        }
    }

    /// §5: up to `maxRetries` attempts with a 1s back-off, dispatched through
    /// the hub facade (and therefore the per-server FIFO queue, C4).
    async fn dispatch_with_retry(&self, server_name: &str, tool_name: &str, args: Value) -> Result<Value, HubError> {
        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            match self.hub.call_tool(server_name, tool_name, args.clone()).await {
                Ok(value) => return Ok(value),
                Err(error) => last_error = Some(error),
            }
        }
        Err(last_error.unwrap_or(HubError::NotConnected(server_name.to_string())))
    }

    async fn attempt_rollback(
        &self,
        server_name: &str,
        tool_name: &str,
        args: &Value,
        operation: OperationType,
        previous_state: Value,
    ) -> Result<(), String> {
        let Some((paired_tool, payload)) =
            paired_rollback_call(&self.hub, server_name, tool_name, args, operation, previous_state)
        else {
            return Ok(());
        };

        self.hub
            .call_tool(server_name, &paired_tool, payload)
            .await
            .map(|_| ())
            .map_err(|error| error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn hub_with_no_servers() -> Arc<Hub> {
        Arc::new(Hub::initialize(vec![]).await)
    }

    #[tokio::test]
    async fn unknown_server_fails_without_panicking() {
        let hub = hub_with_no_servers().await;
        let executor = ToolExecutor::new(
            hub,
            ToolExecutorConfig::default(),
            Arc::new(AlwaysConfirm),
            None,
        );
        let result = executor
            .execute_tool("ghost", "anything", serde_json::json!({}))
            .await;
        assert!(!result.ok);
        assert!(result.error.is_some());
    }

    struct AlwaysDeny;
    #[async_trait]
    impl UserConfirmation for AlwaysDeny {
        async fn confirm(&self, _server_name: &str, _tool_name: &str, _args: &Value) -> bool {
            false
        }
    }

    /// Scenario S4: a dangerous call with a denying confirmation hook fails
    /// with `UserDenied` before any dispatch is attempted — there is no live
    /// server registered for "repo" at all, so a dispatch attempt would
    /// panic or hang rather than quietly fail, proving none occurred.
    #[tokio::test]
    async fn dangerous_call_denied_short_circuits_before_dispatch() {
        let hub = hub_with_no_servers().await;
        hub.catalog().publish(
            "repo",
            vec![hub_core::ToolDescriptor {
                name: "delete_repo".into(),
                description: None,
                input_schema: hub_core::InputSchema::default(),
                safety: None,
            }],
        );

        let executor = ToolExecutor::new(
            hub,
            ToolExecutorConfig::default(),
            Arc::new(AlwaysDeny),
            None,
        );
        let result = executor
            .execute_tool("repo", "delete_repo", serde_json::json!({}))
            .await;
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("denied"));
    }
}
