// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tool Invoker (C4): single entry point that gates, validates, times out
//! and classifies-retries one tool call (spec §4.4).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tracing::{info_span, Instrument};

use crate::application::tool_gate::ToolGate;
use crate::application::tool_registry::ToolRegistry;
use crate::domain::error::{classify_error_message, ErrorClass};
use crate::domain::policy::PolicyContext;
use crate::domain::tool::ToolDefinition;

#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub allowed_tool_ids: HashSet<String>,
    pub policy_context: Option<PolicyContext>,
}

#[derive(Debug, Clone)]
pub enum InvokeOutcome {
    Value(Value),
    Pause {
        prompt: String,
        tool_id: String,
        intent_id: Option<String>,
        agent_id: Option<String>,
        ttl_ms: u64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvokeError {
    PolicyDenied,
    Validation(String),
    Timeout,
    Failed { class: ErrorClass, message: String },
}

impl InvokeError {
    pub fn message(&self) -> String {
        match self {
            InvokeError::PolicyDenied => "this tool is not allowed".to_string(),
            InvokeError::Validation(msg) => msg.clone(),
            InvokeError::Timeout => "tool call timed out".to_string(),
            InvokeError::Failed { message, .. } => message.clone(),
        }
    }
}

pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    gate: Option<Arc<ToolGate>>,
    default_timeout_ms: u64,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>, gate: Option<Arc<ToolGate>>, default_timeout_ms: u64) -> Self {
        Self {
            registry,
            gate,
            default_timeout_ms,
        }
    }

    /// Runs `tool` against `input`, following spec §4.4's six steps:
    /// gate check, allow-list check, validation, timed attempt,
    /// classified retry, cleanup.
    pub async fn invoke(
        &self,
        tool: &ToolDefinition,
        input: Value,
        ctx: &InvocationContext,
        timeout_ms_override: Option<u64>,
        retry: &crate::domain::tool::RetryPolicy,
    ) -> Result<InvokeOutcome, InvokeError> {
        let span = info_span!(
            "tool_invoke",
            tool.id = %tool.id,
            tool.timeout = tracing::field::Empty,
            tool.execution_time = tracing::field::Empty,
            retry.attempt = tracing::field::Empty,
            retry.error_class = tracing::field::Empty,
            otel.kind = "internal",
        );

        async {
            // Step 1: gate check.
            if let (Some(gate), Some(policy_ctx)) = (&self.gate, &ctx.policy_context) {
                let decision = gate.evaluate(&tool.id, policy_ctx).await;
                if !decision.allowed {
                    return Err(InvokeError::PolicyDenied);
                }
                if decision.require_approval {
                    if let Some(session_key) = policy_ctx.session_key() {
                        if !gate.has_approval(&tool.id, session_key).await {
                            if let Some(request) = gate.create_approval_request(&decision, session_key) {
                                return Ok(InvokeOutcome::Pause {
                                    prompt: request.prompt,
                                    tool_id: tool.id.clone(),
                                    intent_id: policy_ctx.intent_id.clone(),
                                    agent_id: policy_ctx.agent_id.clone(),
                                    ttl_ms: request.ttl_ms,
                                });
                            }
                        }
                    }
                }
            }

            // Step 2: allow-list check.
            if !ctx.allowed_tool_ids.contains(&tool.id) {
                return Err(InvokeError::PolicyDenied);
            }

            // Step 3: validation.
            if let Some(schema) = &tool.input_schema {
                schema
                    .decode(&input)
                    .map_err(|e| InvokeError::Validation(e.to_string()))?;
            }

            // Step 4 + 5: timed attempt with classified retry.
            let timeout = Duration::from_millis(timeout_ms_override.unwrap_or(self.default_timeout_ms));
            let invoker = self
                .registry
                .invoker(&tool.id)
                .ok_or_else(|| InvokeError::Failed {
                    class: ErrorClass::Unknown,
                    message: format!("tool '{}' has no registered invoker", tool.id),
                })?;

            let mut attempt = 0u32;
            loop {
                let call = invoker(input.clone());
                let result = tokio::time::timeout(timeout, call).await;

                match result {
                    Err(_elapsed) => {
                        tracing::Span::current().record("retry.attempt", attempt);
                        return Err(InvokeError::Timeout);
                    }
                    Ok(Ok(value)) => return Ok(InvokeOutcome::Value(value)),
                    Ok(Err(message)) => {
                        let class = classify_error_message(&message);
                        tracing::Span::current().record("retry.error_class", format!("{class:?}"));
                        if !class.is_retryable() || attempt >= retry.max_retries {
                            return Err(InvokeError::Failed { class, message });
                        }
                        let jitter_sample: u64 = rand::rng().random();
                        let backoff = retry.backoff_ms_for_attempt(attempt, jitter_sample);
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                        attempt += 1;
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}
