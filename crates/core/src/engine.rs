// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! `Engine`: the composition root wiring the nine application services
//! (C1-C9) and the host's infrastructure adapters into one object. No
//! globals or thread-local state anywhere in this crate — every
//! collaborator is handed in through this constructor, the same way the
//! teacher's `WorkflowEngine::new` takes its repositories, event bus, and
//! execution service as explicit arguments.

use std::sync::Arc;

use serde_json::Value;

use crate::application::agent_step_loop::{AgentStepLoop, HANDOFF_TOOL_ID};
use crate::application::handoff_controller::HandoffController;
use crate::application::mcp_registry::McpClientRegistry;
use crate::application::router::Router;
use crate::application::tool_gate::ToolGate;
use crate::application::tool_invoker::ToolInvoker;
use crate::application::tool_registry::{invoker_fn, ToolRegistry, ToolRegistryError};
use crate::application::turn_coordinator::TurnCoordinator;
use crate::domain::agent::AgentConfig;
use crate::domain::matching::{IntentMatcher, MessageRouter, PipelineExecutor, SemanticMatcher};
use crate::domain::model::ModelProvider;
use crate::domain::pipeline::PipelineConfig;
use crate::domain::repository::ConversationStore;
use crate::domain::tool::ToolDefinition;
use crate::infrastructure::config::EngineConfig;

/// Registers the reserved `handoff_to_agent` tool against the known agent
/// roster (spec §4.7, §6): unknown targets fail the call with a
/// user-facing message listing the agents that do exist, rather than
/// silently no-opping.
fn register_handoff_tool(registry: &ToolRegistry, agents: &[AgentConfig]) -> Result<(), ToolRegistryError> {
    let known_ids: Arc<Vec<String>> = Arc::new(agents.iter().map(|a| a.id.clone()).collect());
    let definition = ToolDefinition {
        id: HANDOFF_TOOL_ID.to_string(),
        name: HANDOFF_TOOL_ID.to_string(),
        description: "Hand the conversation off to another agent by id".to_string(),
        input_schema: None,
        success_schema: None,
        failure_schema: None,
        manual_capabilities: vec![],
        strict: false,
    };
    registry.register(
        definition,
        invoker_fn(move |input: Value| {
            let known_ids = known_ids.clone();
            async move {
                let agent_id = input
                    .get("agentId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| "handoff_to_agent requires an 'agentId' field".to_string())?;
                if !known_ids.iter().any(|id| id == agent_id) {
                    return Err(format!(
                        "unknown target agent '{agent_id}'; available agents: {}",
                        known_ids.join(", ")
                    ));
                }
                Ok(input)
            }
        }),
    )
}

/// The fully wired runtime. Construct one per host process (or per tenant,
/// if the host is multi-tenant) and drive turns through `turn_coordinator`.
pub struct Engine {
    pub config: EngineConfig,
    pub tool_registry: Arc<ToolRegistry>,
    pub tool_gate: Option<Arc<ToolGate>>,
    pub mcp_registry: Option<Arc<McpClientRegistry>>,
    pub turn_coordinator: Arc<TurnCoordinator>,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        model: Arc<dyn ModelProvider>,
        store: Arc<dyn ConversationStore>,
        tool_registry: Arc<ToolRegistry>,
        tool_gate: Option<Arc<ToolGate>>,
        mcp_registry: Option<Arc<McpClientRegistry>>,
        agents: Vec<AgentConfig>,
        pipelines: Vec<PipelineConfig>,
        pipeline_executor: Option<Arc<dyn PipelineExecutor>>,
        message_router: Option<Box<dyn MessageRouter>>,
        semantic_matcher: Option<Box<dyn SemanticMatcher>>,
        intent_matcher: Option<Box<dyn IntentMatcher>>,
        default_agent_id: Option<String>,
    ) -> Result<Self, ToolRegistryError> {
        if tool_registry.lookup(HANDOFF_TOOL_ID).is_none() {
            register_handoff_tool(&tool_registry, &agents)?;
        }

        // Every call site passes the invoking agent's own `tool_timeout_ms`
        // as an override (spec §4.4 step 4), so this default only matters
        // for call paths with no agent context.
        const DEFAULT_TOOL_TIMEOUT_MS: u64 = 300_000;
        let invoker = Arc::new(ToolInvoker::new(tool_registry.clone(), tool_gate.clone(), DEFAULT_TOOL_TIMEOUT_MS));
        let step_loop = Arc::new(AgentStepLoop::new(model, invoker));
        let handoff = HandoffController::new(step_loop.clone(), store.clone());
        let router = Router::new(message_router, semantic_matcher, intent_matcher, default_agent_id);
        let turn_coordinator = Arc::new(TurnCoordinator::new(
            store,
            router,
            handoff,
            step_loop,
            tool_registry.clone(),
            agents,
            pipelines,
            pipeline_executor,
            config.max_message_chars,
        ));

        Ok(Self {
            config,
            tool_registry,
            tool_gate,
            mcp_registry,
            turn_coordinator,
        })
    }
}
