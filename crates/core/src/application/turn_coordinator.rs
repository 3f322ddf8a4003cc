// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Turn Coordinator (C9): the top-level per-turn orchestrator gluing the
//! Router (C8) to the Agent Step Loop (C5) and Handoff Controller (C7),
//! and owning conversation history persistence (spec §4.9).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::application::agent_step_loop::{AgentStepLoop, HANDOFF_TOOL_ID};
use crate::application::handoff_controller::{HandoffController, HopRequest};
use crate::application::router::{RouteTarget, Router};
use crate::application::stream_pipeline::StreamSink;
use crate::application::tool_registry::ToolRegistry;
use crate::domain::agent::AgentConfig;
use crate::domain::error::EngineError;
use crate::domain::events::{HandoffKind, HandoffResult, TurnResult};
use crate::domain::matching::PipelineExecutor;
use crate::domain::message::{mint_conversation_id, Message};
use crate::domain::pipeline::PipelineConfig;
use crate::domain::policy::PolicyContext;
use crate::domain::repository::ConversationStore;
use crate::domain::tool::ToolDefinition;

#[derive(Debug, Clone, Default)]
pub struct TurnOptions {
    pub conversation_id: Option<String>,
    pub require_conversation_id: bool,
}

pub struct TurnCoordinator {
    store: Arc<dyn ConversationStore>,
    router: Router,
    handoff: HandoffController,
    step_loop: Arc<AgentStepLoop>,
    tool_registry: Arc<ToolRegistry>,
    agents: HashMap<String, AgentConfig>,
    pipelines: Vec<PipelineConfig>,
    pipeline_executor: Option<Arc<dyn PipelineExecutor>>,
    max_message_chars: usize,
}

impl TurnCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ConversationStore>,
        router: Router,
        handoff: HandoffController,
        step_loop: Arc<AgentStepLoop>,
        tool_registry: Arc<ToolRegistry>,
        agents: Vec<AgentConfig>,
        pipelines: Vec<PipelineConfig>,
        pipeline_executor: Option<Arc<dyn PipelineExecutor>>,
        max_message_chars: usize,
    ) -> Self {
        Self {
            store,
            router,
            handoff,
            step_loop,
            tool_registry,
            agents: agents.into_iter().map(|a| (a.id.clone(), a)).collect(),
            pipelines,
            pipeline_executor,
            max_message_chars,
        }
    }

    fn allowed_tools_for(&self, agent: &AgentConfig) -> Vec<ToolDefinition> {
        let mut tools = self.tool_registry.normalize(&agent.tool_ids);
        if !tools.iter().any(|t| t.id == HANDOFF_TOOL_ID) {
            if let Some(handoff_tool) = self.tool_registry.lookup(HANDOFF_TOOL_ID) {
                tools.push(handoff_tool);
            }
        }
        tools
    }

    fn hop_request<'a>(&self, agent: &'a AgentConfig) -> HopRequest<'a> {
        let mut vars = HashMap::new();
        vars.insert("id".to_string(), serde_json::Value::String(agent.id.clone()));
        let system_prompt = self
            .step_loop
            .render_system_prompt(agent, &vars)
            .unwrap_or_else(|_| agent.system_prompt_template.clone());
        HopRequest {
            agent,
            system_prompt,
            allowed_tools: self.allowed_tools_for(agent),
            policy_context: Some(PolicyContext {
                agent_id: Some(agent.id.clone()),
                ..Default::default()
            }),
        }
    }

    fn validate_message(&self, message: &str) -> Result<(), EngineError> {
        if message.is_empty() || message.chars().count() > self.max_message_chars {
            return Err(EngineError::MessageValidation(format!(
                "message must be non-empty and at most {} characters",
                self.max_message_chars
            )));
        }
        Ok(())
    }

    fn resolve_conversation_id(&self, options: &TurnOptions) -> Result<String, EngineError> {
        if let Some(id) = &options.conversation_id {
            return Ok(id.clone());
        }
        if options.require_conversation_id {
            return Err(EngineError::ConversationIdRequired);
        }
        Ok(mint_conversation_id(Utc::now().timestamp_millis()))
    }

    /// Drives one non-streaming turn end to end (spec §4.9).
    pub async fn process_message(
        &self,
        message: String,
        options: TurnOptions,
    ) -> Result<TurnResult, EngineError> {
        self.validate_message(&message)?;
        let conversation_id = self.resolve_conversation_id(&options)?;
        let history = self
            .store
            .get_history(&conversation_id)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;

        let target = self
            .router
            .route(&message, &self.agents.values().cloned().collect::<Vec<_>>(), &self.pipelines)
            .await;

        let (sink, mut receiver) = StreamSink::new(conversation_id.clone(), None, 256);
        tokio::spawn(async move { while receiver.recv().await.is_some() {} });

        match target {
            Some(RouteTarget::PrecomputedResponse(result)) => Ok(*result),
            Some(RouteTarget::Pipeline { id, .. }) => {
                let Some(executor) = &self.pipeline_executor else {
                    return Err(EngineError::RouteExecution(format!(
                        "pipeline '{id}' matched but no pipeline executor is configured"
                    )));
                };
                executor
                    .execute(&id, &message)
                    .await
                    .map_err(EngineError::RouteExecution)
            }
            Some(RouteTarget::Agent { id, .. }) => {
                let Some(agent) = self.agents.get(&id) else {
                    return Err(EngineError::UnknownAgent(id));
                };
                if agent.persist_history {
                    self.store
                        .add_message(&conversation_id, Message::User { text: message.clone() })
                        .await
                        .map_err(|e| EngineError::Store(e.to_string()))?;
                }
                let request = self.hop_request(agent);
                let outcome = self
                    .handoff
                    .run_chain(&conversation_id, request, history, message, &sink, false, |target_id| {
                        self.agents.get(target_id).map(|a| self.hop_request(a))
                    })
                    .await?;

                Ok(TurnResult {
                    content: outcome.content,
                    tool_calls: outcome.tool_calls,
                    usage: outcome.usage,
                    handoff: outcome.handoff.map(|signal| HandoffResult {
                        kind: HandoffKind::Handoff,
                        agent_id: signal.agent_id,
                        message: signal.message,
                        context: signal.context,
                    }),
                })
            }
            None => Err(EngineError::RouteExecution(
                "no agent, pipeline, intent, or default target matched this message".to_string(),
            )),
        }
    }

    /// Streaming variant: returns the event receiver immediately; the turn
    /// runs to completion in a spawned task emitting to it (spec §6
    /// `streamMessage`). Takes `Arc<Self>` because the spawned task must
    /// outlive this call.
    pub async fn stream_message(
        self: Arc<Self>,
        message: String,
        options: TurnOptions,
    ) -> Result<tokio::sync::mpsc::Receiver<crate::domain::events::StreamEvent>, EngineError> {
        self.validate_message(&message)?;
        let conversation_id = self.resolve_conversation_id(&options)?;
        let history = self
            .store
            .get_history(&conversation_id)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;

        let (sink, receiver) = StreamSink::new(conversation_id.clone(), None, 256);
        sink.run_start(message.clone(), history.clone()).await.ok();

        let coordinator = self.clone();
        tokio::spawn(async move {
            let started_at_ms = Utc::now().timestamp_millis();
            let target = coordinator
                .router
                .route(
                    &message,
                    &coordinator.agents.values().cloned().collect::<Vec<_>>(),
                    &coordinator.pipelines,
                )
                .await;

            let Some(RouteTarget::Agent { id, .. }) = target else {
                sink.run_end(started_at_ms, String::new(), vec![], None, None).await.ok();
                return;
            };
            let Some(agent) = coordinator.agents.get(&id).cloned() else {
                sink.run_end(started_at_ms, String::new(), vec![], None, None).await.ok();
                return;
            };

            if agent.persist_history
                && coordinator
                    .store
                    .add_message(&conversation_id, Message::User { text: message.clone() })
                    .await
                    .is_err()
            {
                return;
            }

            let request = coordinator.hop_request(&agent);
            let outcome = match coordinator
                .handoff
                .run_chain(&conversation_id, request, history, message, &sink, true, |target_id| {
                    coordinator.agents.get(target_id).map(|a| coordinator.hop_request(a))
                })
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => return,
            };

            sink.run_end(
                started_at_ms,
                outcome.content,
                outcome.tool_calls,
                outcome.usage,
                outcome
                    .handoff
                    .map(|signal| (signal.agent_id, signal.message, signal.context)),
            )
            .await
            .ok();
        });

        Ok(receiver)
    }
}
