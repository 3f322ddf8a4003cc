// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Agent Step Loop Application Service (C5)
//!
//! Drives a single agent from a user message to a final assistant message,
//! interleaving up to `max_steps` model turns with tool calls (spec §4.5).
//!
//! # Step contract
//!
//! A step is one model invocation that may produce final text, tool
//! calls, or both. Tool calls run through the Tool Invoker (C4) and their
//! outcomes become `Tool` messages feeding the next step. The loop ends
//! when a step produces no tool calls or `max_steps` is reached.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use handlebars::Handlebars;
use serde_json::Value;
use tracing::warn;

use crate::application::stream_pipeline::StreamSink;
use crate::application::tool_invoker::{InvocationContext, InvokeError, InvokeOutcome, ToolInvoker};
use crate::domain::agent::AgentConfig;
use crate::domain::error::EngineError;
use crate::domain::events::{ToolCallErrorCode, ToolCallOutcome, Usage};
use crate::domain::message::{Message, MessagePart};
use crate::domain::model::{GenerateOptions, ModelCallResult, ModelPrompt, ModelProvider, ModelStreamEvent};
use crate::domain::policy::PolicyContext;
use crate::domain::tool::ToolDefinition;

pub const HANDOFF_TOOL_ID: &str = "handoff_to_agent";

#[derive(Debug, Clone)]
pub struct HandoffSignal {
    pub agent_id: String,
    pub message: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StepLoopOutcome {
    pub content: String,
    pub tool_calls: Vec<ToolCallOutcome>,
    /// Assistant/tool messages produced this turn, in emission order, for
    /// the Turn Coordinator to persist (spec §4.9 step 7).
    pub produced_messages: Vec<Message>,
    pub usage: Option<Usage>,
    pub handoff: Option<HandoffSignal>,
    pub paused: bool,
}

/// Drops `Assistant.ToolCall`/`Tool.ToolResult` parts whose `name` is not
/// in `allowed`; drops a message entirely if filtering empties its parts
/// (spec §4.5.2). Pure function — no I/O, easy to property-test.
pub fn filter_history_by_tool_names(history: &[Message], allowed: &HashSet<&str>) -> Vec<Message> {
    history
        .iter()
        .filter_map(|message| match message {
            Message::User { .. } => Some(message.clone()),
            Message::Assistant { parts } | Message::Tool { parts } => {
                let kept: Vec<MessagePart> = parts
                    .iter()
                    .filter(|part| match part.tool_call_name() {
                        Some(name) => allowed.contains(name),
                        None => true,
                    })
                    .cloned()
                    .collect();
                if kept.is_empty() {
                    None
                } else if matches!(message, Message::Assistant { .. }) {
                    Some(Message::Assistant { parts: kept })
                } else {
                    Some(Message::Tool { parts: kept })
                }
            }
        })
        .collect()
}

pub struct AgentStepLoop {
    model: Arc<dyn ModelProvider>,
    invoker: Arc<ToolInvoker>,
    templates: Handlebars<'static>,
}

impl AgentStepLoop {
    pub fn new(model: Arc<dyn ModelProvider>, invoker: Arc<ToolInvoker>) -> Self {
        Self {
            model,
            invoker,
            templates: Handlebars::new(),
        }
    }

    /// Substitutes template variables into `agent.system_prompt_template`.
    pub fn render_system_prompt(
        &self,
        agent: &AgentConfig,
        vars: &HashMap<String, Value>,
    ) -> Result<String, EngineError> {
        self.templates
            .render_template(&agent.system_prompt_template, vars)
            .map_err(|e| EngineError::Other(anyhow::anyhow!(e)))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        agent: &AgentConfig,
        system_prompt: String,
        history: Vec<Message>,
        user_message: String,
        allowed_tools: Vec<ToolDefinition>,
        policy_context: Option<PolicyContext>,
        sink: &StreamSink,
        streaming: bool,
    ) -> Result<StepLoopOutcome, EngineError> {
        let allowed_names: HashSet<&str> = allowed_tools.iter().map(|t| t.name.as_str()).collect();
        let allowed_ids: HashSet<String> = allowed_tools.iter().map(|t| t.id.clone()).collect();
        let filtered_history = filter_history_by_tool_names(&history, &allowed_names);

        let max_steps = agent.effective_max_steps(streaming);
        let mut produced_messages = Vec::new();
        let mut final_text = String::new();
        let mut all_tool_calls = Vec::new();
        let mut last_usage: Option<Usage> = None;
        let mut handoff = None;
        let mut paused = false;

        'steps: for step_index in 0..max_steps {
            sink.step_start(step_index).await.ok();

            let prompt = ModelPrompt {
                system: system_prompt.clone(),
                history: filtered_history
                    .iter()
                    .cloned()
                    .chain(produced_messages.iter().cloned())
                    .collect(),
                user_message: user_message.clone(),
            };
            let options = GenerateOptions {
                toolkit: allowed_tools.clone(),
                tool_choice: agent.tool_choice.clone(),
                max_steps,
                temperature_millis: agent.model.temperature_millis,
            };

            let step_result = if streaming {
                self.run_streaming_step(&prompt, &options, agent, step_index, sink).await?
            } else {
                self.model
                    .generate_text(&agent.model, &prompt, &options)
                    .await
                    .map_err(|e| EngineError::RouteExecution(e.to_string()))?
            };

            final_text = step_result.text.clone();
            last_usage = Some(Usage {
                input_tokens: step_result.usage.input_tokens,
                output_tokens: step_result.usage.output_tokens,
                total_tokens: step_result.usage.total_tokens,
            });

            if !step_result.text.is_empty() {
                produced_messages.push(Message::Assistant {
                    parts: vec![MessagePart::Text {
                        text: step_result.text.clone(),
                    }],
                });
            }

            if step_result.tool_calls.is_empty() {
                sink.step_complete(step_index).await.ok();
                break 'steps;
            }

            let mut assistant_calls = Vec::new();
            let mut tool_results = Vec::new();

            for call in &step_result.tool_calls {
                sink.tool_call(step_index, call.id.clone(), call.name.clone(), call.params.clone())
                    .await
                    .ok();
                assistant_calls.push(MessagePart::ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    params: call.params.clone(),
                });

                let Some(tool) = allowed_tools.iter().find(|t| t.id == call.name || t.name == call.name) else {
                    let outcome = ToolCallOutcome {
                        tool_id: call.name.clone(),
                        args: call.params.clone(),
                        result: None,
                        error: Some(ToolCallErrorCode {
                            code: "POLICY_DENIED".to_string(),
                            message: "tool is not available to this agent".to_string(),
                        }),
                    };
                    sink.tool_error(step_index, call.id.clone(), call.name.clone(), outcome.error.as_ref().unwrap().message.clone())
                        .await
                        .ok();
                    tool_results.push(MessagePart::ToolResult {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        result: Value::Null,
                        is_failure: true,
                    });
                    all_tool_calls.push(outcome);
                    continue;
                };

                let invoke_ctx = InvocationContext {
                    allowed_tool_ids: allowed_ids.clone(),
                    policy_context: policy_context.clone(),
                };
                let invocation = self
                    .invoker
                    .invoke(
                        tool,
                        call.params.clone(),
                        &invoke_ctx,
                        Some(agent.tool_timeout_ms),
                        &agent.retry_policy,
                    )
                    .await;

                match invocation {
                    Ok(InvokeOutcome::Value(value)) => {
                        sink.tool_result(step_index, call.id.clone(), call.name.clone(), value.clone())
                            .await
                            .ok();
                        tool_results.push(MessagePart::ToolResult {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            result: value.clone(),
                            is_failure: false,
                        });
                        all_tool_calls.push(ToolCallOutcome {
                            tool_id: call.name.clone(),
                            args: call.params.clone(),
                            result: Some(value.clone()),
                            error: None,
                        });

                        if call.name == HANDOFF_TOOL_ID {
                            if let Some(signal) = parse_handoff_value(&value) {
                                handoff = Some(signal);
                            }
                        }
                    }
                    Ok(InvokeOutcome::Pause {
                        prompt: approval_prompt,
                        tool_id,
                        ttl_ms,
                        ..
                    }) => {
                        sink.approval_required(step_index, call.id.clone(), tool_id, approval_prompt, ttl_ms)
                            .await
                            .ok();
                        paused = true;
                        break 'steps;
                    }
                    Err(err) => {
                        let code = match &err {
                            InvokeError::PolicyDenied => "POLICY_DENIED",
                            InvokeError::Validation(_) => "VALIDATION",
                            InvokeError::Timeout => "TOOL_TIMEOUT",
                            InvokeError::Failed { .. } => "UNKNOWN",
                        };
                        let message = err.message();
                        sink.tool_error(step_index, call.id.clone(), call.name.clone(), message.clone())
                            .await
                            .ok();
                        tool_results.push(MessagePart::ToolResult {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            result: Value::Null,
                            is_failure: true,
                        });
                        all_tool_calls.push(ToolCallOutcome {
                            tool_id: call.name.clone(),
                            args: call.params.clone(),
                            result: None,
                            error: Some(ToolCallErrorCode {
                                code: code.to_string(),
                                message,
                            }),
                        });
                    }
                }
            }

            if !assistant_calls.is_empty() {
                produced_messages.push(Message::Assistant { parts: assistant_calls });
            }
            if !tool_results.is_empty() {
                produced_messages.push(Message::Tool { parts: tool_results });
            }

            sink.step_complete(step_index).await.ok();

            if handoff.is_some() || paused {
                break 'steps;
            }
        }

        if let Some(usage) = &last_usage {
            sink.usage(usage.clone()).await.ok();
        }

        Ok(StepLoopOutcome {
            content: final_text,
            tool_calls: all_tool_calls,
            produced_messages,
            usage: last_usage,
            handoff,
            paused,
        })
    }

    async fn run_streaming_step(
        &self,
        prompt: &ModelPrompt,
        options: &GenerateOptions,
        agent: &AgentConfig,
        step_index: u32,
        sink: &StreamSink,
    ) -> Result<ModelCallResult, EngineError> {
        use futures::StreamExt;

        let mut stream = self
            .model
            .stream_text(&agent.model, prompt, options)
            .await
            .map_err(|e| EngineError::RouteExecution(e.to_string()))?;

        let mut accumulated = String::new();
        let mut tool_calls = Vec::new();
        let mut usage = crate::domain::model::TokenUsage::default();

        while let Some(event) = stream.next().await {
            match event.map_err(|e| EngineError::RouteExecution(e.to_string()))? {
                ModelStreamEvent::TextDelta(delta) => {
                    accumulated.push_str(&delta);
                    sink.token(step_index, delta, accumulated.clone()).await.ok();
                }
                ModelStreamEvent::ToolCall(call) => tool_calls.push(call),
                ModelStreamEvent::Done { usage: final_usage } => usage = final_usage,
            }
        }

        Ok(ModelCallResult {
            text: accumulated,
            tool_calls,
            usage,
        })
    }
}

fn parse_handoff_value(value: &Value) -> Option<HandoffSignal> {
    let obj = value.as_object()?;
    let agent_id = obj.get("agentId")?.as_str()?.to_string();
    let message = obj
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let context = obj.get("context").and_then(Value::as_str).map(str::to_string);
    Some(HandoffSignal {
        agent_id,
        message,
        context,
    })
}

/// Unused in production wiring (the invoker's own error path already
/// warns); kept here as the documented place future call sites that need
/// to downgrade a surfaced error to a warning should hook into.
#[allow(dead_code)]
fn log_recovered(message: &str) {
    warn!(%message, "recovered locally from tool-call failure");
}
