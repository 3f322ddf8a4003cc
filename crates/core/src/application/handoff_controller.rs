// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Handoff Controller (C7): chains agents on a successful call to the
//! reserved tool `handoff_to_agent`, bounded by `MAX_HANDOFF_DEPTH` (spec §4.7).

use std::sync::Arc;

use tracing::warn;

use crate::application::agent_step_loop::{AgentStepLoop, StepLoopOutcome};
use crate::application::stream_pipeline::StreamSink;
use crate::domain::agent::AgentConfig;
use crate::domain::error::EngineError;
use crate::domain::message::{remint_tool_call_ids, Message};
use crate::domain::policy::PolicyContext;
use crate::domain::repository::ConversationStore;
use crate::domain::tool::ToolDefinition;

pub const MAX_HANDOFF_DEPTH: u32 = 10;

/// Everything the controller needs to start (or continue) a single hop,
/// supplied by the Turn Coordinator so this module stays free of any
/// knowledge of how agents/tools/prompts are looked up.
pub struct HopRequest<'a> {
    pub agent: &'a AgentConfig,
    pub system_prompt: String,
    pub allowed_tools: Vec<ToolDefinition>,
    pub policy_context: Option<PolicyContext>,
}

pub struct HandoffController {
    step_loop: Arc<AgentStepLoop>,
    store: Arc<dyn ConversationStore>,
}

impl HandoffController {
    pub fn new(step_loop: Arc<AgentStepLoop>, store: Arc<dyn ConversationStore>) -> Self {
        Self { step_loop, store }
    }

    /// Drives one agent, then follows any `handoff_to_agent` signal it
    /// produces by re-invoking `resolve_hop` for the named target, until a
    /// step loop run produces no handoff, the target is unknown, or
    /// `MAX_HANDOFF_DEPTH` is reached. `resolve_hop` returns `None` for an
    /// unknown agent id; `conversation_id` is used to re-read persisted
    /// history before each hop so the target sees the caller's freshly
    /// appended messages (spec §4.7).
    #[allow(clippy::too_many_arguments)]
    pub async fn run_chain<'a, F>(
        &self,
        conversation_id: &str,
        initial: HopRequest<'a>,
        initial_history: Vec<Message>,
        original_user_message: String,
        sink: &StreamSink,
        streaming: bool,
        mut resolve_hop: F,
    ) -> Result<StepLoopOutcome, EngineError>
    where
        F: FnMut(&str) -> Option<HopRequest<'a>>,
    {
        let mut current_agent_id = initial.agent.id.clone();
        let mut request = initial;
        let mut history = initial_history;
        let mut message = original_user_message;
        let mut depth = 0u32;

        loop {
            let outcome = self
                .step_loop
                .run(
                    request.agent,
                    request.system_prompt.clone(),
                    history.clone(),
                    message.clone(),
                    request.allowed_tools.clone(),
                    request.policy_context.clone(),
                    sink,
                    streaming,
                )
                .await?;

            if request.agent.persist_history && !outcome.produced_messages.is_empty() {
                let messages = remint_tool_call_ids(outcome.produced_messages.clone());
                self.store
                    .add_messages(conversation_id, messages)
                    .await
                    .map_err(|e| EngineError::Store(e.to_string()))?;
            }

            let Some(signal) = &outcome.handoff else {
                return Ok(outcome);
            };

            if depth + 1 > MAX_HANDOFF_DEPTH {
                warn!(depth, "handoff chain reached MAX_HANDOFF_DEPTH, terminating without handoff-start");
                return Ok(outcome);
            }

            let Some(next_request) = resolve_hop(&signal.agent_id) else {
                warn!(target = %signal.agent_id, "handoff targets an unknown agent, terminating chain");
                return Ok(outcome);
            };

            depth += 1;
            sink.handoff_start(
                current_agent_id.clone(),
                signal.agent_id.clone(),
                signal.message.clone(),
                signal.context.clone(),
                depth,
            )
            .await
            .ok();

            history = self
                .store
                .get_history(conversation_id)
                .await
                .map_err(|e| EngineError::Store(e.to_string()))?;

            message = if signal.message.is_empty() {
                message
            } else {
                signal.message.clone()
            };
            if let Some(context) = &signal.context {
                message = format!("{message}\n{context}");
            }

            current_agent_id = next_request.agent.id.clone();
            request = next_request;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::stream_pipeline::StreamSink;
    use crate::application::tool_invoker::ToolInvoker;
    use crate::application::tool_registry::ToolRegistry;
    use crate::domain::agent::ModelCoordinates;
    use crate::domain::model::{
        GenerateOptions, ModelCallResult, ModelEventStream, ModelPrompt, ModelProvider,
        ModelProviderError, ModelToolCall, TokenUsage,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    struct ScriptedProvider {
        scripts: StdMutex<HashMap<String, Vec<ModelCallResult>>>,
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn resolve(&self, _coords: &ModelCoordinates) -> Result<(), ModelProviderError> {
            Ok(())
        }

        async fn generate_text(
            &self,
            coords: &ModelCoordinates,
            _prompt: &ModelPrompt,
            _options: &GenerateOptions,
        ) -> Result<ModelCallResult, ModelProviderError> {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.get_mut(&coords.provider_id).expect("scripted response");
            Ok(script.remove(0))
        }

        async fn stream_text(
            &self,
            _coords: &ModelCoordinates,
            _prompt: &ModelPrompt,
            _options: &GenerateOptions,
        ) -> Result<ModelEventStream, ModelProviderError> {
            unimplemented!("not exercised in this test")
        }
    }

    fn agent(id: &str) -> AgentConfig {
        AgentConfig {
            id: id.to_string(),
            system_prompt_template: "you are {{id}}".into(),
            model: ModelCoordinates {
                provider_id: id.to_string(),
                model: "test".into(),
                temperature_millis: None,
                max_tokens: None,
            },
            tool_ids: vec![],
            utterances: vec![],
            max_steps: 5,
            tool_choice: Default::default(),
            tool_timeout_ms: 1000,
            retry_policy: Default::default(),
            mcp_server_ids: vec![],
            persist_history: true,
        }
    }

    struct NullStore;

    #[async_trait]
    impl ConversationStore for NullStore {
        async fn get(&self, _id: &str) -> Result<Option<crate::domain::message::Conversation>, crate::domain::repository::StoreError> {
            Ok(None)
        }
        async fn set(&self, _c: crate::domain::message::Conversation) -> Result<(), crate::domain::repository::StoreError> {
            Ok(())
        }
        async fn delete(&self, _id: &str) -> Result<(), crate::domain::repository::StoreError> {
            Ok(())
        }
        async fn clear(&self) -> Result<(), crate::domain::repository::StoreError> {
            Ok(())
        }
        async fn add_message(&self, _id: &str, _m: Message) -> Result<(), crate::domain::repository::StoreError> {
            Ok(())
        }
        async fn add_messages(&self, _id: &str, _m: Vec<Message>) -> Result<(), crate::domain::repository::StoreError> {
            Ok(())
        }
        async fn get_history(&self, _id: &str) -> Result<Vec<Message>, crate::domain::repository::StoreError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn follows_one_handoff_hop_to_a_known_agent() {
        let mut scripts = HashMap::new();
        scripts.insert(
            "concierge".to_string(),
            vec![ModelCallResult {
                text: "".into(),
                tool_calls: vec![ModelToolCall {
                    id: "c1".into(),
                    name: "handoff_to_agent".into(),
                    params: serde_json::json!({"agentId": "billing"}),
                }],
                usage: TokenUsage::default(),
            }],
        );
        scripts.insert(
            "billing".to_string(),
            vec![ModelCallResult {
                text: "invoice sent".into(),
                tool_calls: vec![],
                usage: TokenUsage::default(),
            }],
        );
        let provider = Arc::new(ScriptedProvider {
            scripts: StdMutex::new(scripts),
        });

        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(
                crate::domain::tool::ToolDefinition {
                    id: "handoff_to_agent".into(),
                    name: "handoff_to_agent".into(),
                    description: "".into(),
                    input_schema: None,
                    success_schema: None,
                    failure_schema: None,
                    manual_capabilities: vec![],
                    strict: false,
                },
                crate::application::tool_registry::invoker_fn(|input| async move { Ok(input) }),
            )
            .unwrap();
        let invoker = Arc::new(ToolInvoker::new(registry, None, 1000));
        let step_loop = Arc::new(AgentStepLoop::new(provider, invoker));
        let controller = HandoffController::new(step_loop, Arc::new(NullStore));

        let concierge = agent("concierge");
        let billing = agent("billing");
        let handoff_tool = crate::domain::tool::ToolDefinition {
            id: "handoff_to_agent".into(),
            name: "handoff_to_agent".into(),
            description: "".into(),
            input_schema: None,
            success_schema: None,
            failure_schema: None,
            manual_capabilities: vec![],
            strict: false,
        };

        let (sink, mut rx) = StreamSink::new("run-1".into(), None, 64);
        let outcome = controller
            .run_chain(
                "conv-1",
                HopRequest {
                    agent: &concierge,
                    system_prompt: "you are concierge".into(),
                    allowed_tools: vec![handoff_tool.clone()],
                    policy_context: None,
                },
                vec![],
                "hello".into(),
                &sink,
                false,
                |target| {
                    if target == "billing" {
                        Some(HopRequest {
                            agent: &billing,
                            system_prompt: "you are billing".into(),
                            allowed_tools: vec![],
                            policy_context: None,
                        })
                    } else {
                        None
                    }
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.content, "invoice sent");
        drop(sink);
        let mut saw_handoff_start = false;
        while let Some(event) = rx.recv().await {
            if matches!(event.kind, crate::domain::events::StreamEventKind::HandoffStart { .. }) {
                saw_handoff_start = true;
            }
        }
        assert!(saw_handoff_start);
    }
}
