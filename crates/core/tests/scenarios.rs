// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios exercising the fully wired `Engine`: one user
//! message in, a `TurnResult` or a `StreamEvent` sequence out, through the
//! real Router, Agent Step Loop, Tool Gate, Tool Invoker, and Handoff
//! Controller working together rather than in isolation.

use std::collections::HashMap;
use std::sync::Arc;

use agentflow_core::application::tool_gate::ToolGate;
use agentflow_core::application::tool_registry::{invoker_fn, ToolRegistry};
use agentflow_core::application::TurnOptions;
use agentflow_core::domain::agent::{AgentConfig, ModelCoordinates};
use agentflow_core::domain::events::StreamEventKind;
use agentflow_core::domain::model::{ModelCallResult, ModelToolCall, TokenUsage};
use agentflow_core::domain::policy::{PolicyBundle, PolicyRule};
use agentflow_core::domain::repository::ConversationStore;
use agentflow_core::domain::tool::ToolDefinition;
use agentflow_core::infrastructure::{EngineConfig, InMemoryConversationStore, ScriptedModelProvider};
use agentflow_core::Engine;

fn agent(id: &str, max_steps: u32) -> AgentConfig {
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
        max_steps,
        tool_choice: Default::default(),
        tool_timeout_ms: 5_000,
        retry_policy: Default::default(),
        mcp_server_ids: vec![],
        persist_history: true,
    }
}

fn bare_tool(id: &str) -> ToolDefinition {
    ToolDefinition {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        input_schema: None,
        success_schema: None,
        failure_schema: None,
        manual_capabilities: vec![],
        strict: false,
    }
}

fn text_result(text: &str) -> ModelCallResult {
    ModelCallResult {
        text: text.to_string(),
        tool_calls: vec![],
        usage: TokenUsage::default(),
    }
}

/// Scenario 1: basic turn. A single tool-less agent answers directly; the
/// conversation ends up with exactly the user message and the assistant
/// reply.
#[tokio::test]
async fn basic_turn_produces_one_user_and_one_assistant_message() {
    let mut scripts = HashMap::new();
    scripts.insert("concierge".to_string(), vec![text_result("hello there")]);
    let provider = Arc::new(ScriptedModelProvider::new(scripts));
    let store = Arc::new(InMemoryConversationStore::default());

    let engine = Engine::new(
        EngineConfig::default(),
        provider,
        store.clone(),
        Arc::new(ToolRegistry::new()),
        None,
        None,
        vec![agent("concierge", 3)],
        vec![],
        None,
        None,
        None,
        None,
        Some("concierge".to_string()),
    )
    .unwrap();

    let result = engine
        .turn_coordinator
        .process_message(
            "hello".to_string(),
            TurnOptions {
                conversation_id: Some("conv-1".to_string()),
                require_conversation_id: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(result.content, "hello there");
    assert!(result.tool_calls.is_empty());

    let history = store.get_history("conv-1").await.unwrap();
    assert_eq!(history.len(), 2);
}

/// Scenario 3: policy deny. A default policy rule denies `admin_tool`
/// outright (no approval path); the model's call to it must surface as a
/// `POLICY_DENIED` tool-call error without the tool's invoker ever running.
#[tokio::test]
async fn policy_denied_tool_is_never_invoked() {
    let mut scripts = HashMap::new();
    scripts.insert(
        "concierge".to_string(),
        vec![ModelCallResult {
            text: String::new(),
            tool_calls: vec![ModelToolCall {
                id: "call-1".into(),
                name: "admin_tool".into(),
                params: serde_json::json!({}),
            }],
            usage: TokenUsage::default(),
        }],
    );
    let provider = Arc::new(ScriptedModelProvider::new(scripts));

    let registry = Arc::new(ToolRegistry::new());
    registry
        .register(
            bare_tool("admin_tool"),
            invoker_fn(|_input| async move { panic!("denied tool must never be invoked") }),
        )
        .unwrap();

    let bundle = PolicyBundle {
        default: PolicyRule {
            deny: ["admin_tool".to_string()].into(),
            ..Default::default()
        },
        ..Default::default()
    };
    let gate = Arc::new(ToolGate::with_default_ttl(bundle));

    let mut concierge = agent("concierge", 1);
    concierge.tool_ids = vec!["admin_tool".to_string()];

    let engine = Engine::new(
        EngineConfig::default(),
        provider,
        Arc::new(InMemoryConversationStore::default()),
        registry,
        Some(gate),
        None,
        vec![concierge],
        vec![],
        None,
        None,
        None,
        None,
        Some("concierge".to_string()),
    )
    .unwrap();

    let result = engine
        .turn_coordinator
        .process_message("please run admin_tool".to_string(), TurnOptions::default())
        .await
        .unwrap();

    assert_eq!(result.tool_calls.len(), 1);
    let error = result.tool_calls[0].error.as_ref().expect("tool call must have failed");
    assert_eq!(error.code, "POLICY_DENIED");
}

/// Scenario 4: handoff chain. `a1` hands off to `a2`, which hands off to
/// `a3`, which answers directly. The final result carries `a3`'s content
/// and no further handoff.
#[tokio::test]
async fn handoff_chain_ends_with_final_agents_answer() {
    let mut scripts = HashMap::new();
    scripts.insert(
        "a1".to_string(),
        vec![ModelCallResult {
            text: String::new(),
            tool_calls: vec![ModelToolCall {
                id: "c1".into(),
                name: "handoff_to_agent".into(),
                params: serde_json::json!({"agentId": "a2"}),
            }],
            usage: TokenUsage::default(),
        }],
    );
    scripts.insert(
        "a2".to_string(),
        vec![ModelCallResult {
            text: String::new(),
            tool_calls: vec![ModelToolCall {
                id: "c2".into(),
                name: "handoff_to_agent".into(),
                params: serde_json::json!({"agentId": "a3"}),
            }],
            usage: TokenUsage::default(),
        }],
    );
    scripts.insert("a3".to_string(), vec![text_result("done")]);
    let provider = Arc::new(ScriptedModelProvider::new(scripts));

    let engine = Engine::new(
        EngineConfig::default(),
        provider,
        Arc::new(InMemoryConversationStore::default()),
        Arc::new(ToolRegistry::new()),
        None,
        None,
        vec![agent("a1", 1), agent("a2", 1), agent("a3", 1)],
        vec![],
        None,
        None,
        None,
        None,
        Some("a1".to_string()),
    )
    .unwrap();

    let mut receiver = engine
        .turn_coordinator
        .clone()
        .stream_message(
            "hi".to_string(),
            TurnOptions {
                conversation_id: Some("conv-chain".to_string()),
                require_conversation_id: true,
            },
        )
        .await
        .unwrap();

    let mut handoff_depths = Vec::new();
    let mut final_result = None;
    while let Some(event) = receiver.recv().await {
        match event.kind {
            StreamEventKind::HandoffStart { handoff_depth, .. } => handoff_depths.push(handoff_depth),
            StreamEventKind::RunEnd { result, .. } => final_result = Some(result),
            _ => {}
        }
    }

    assert_eq!(handoff_depths, vec![1, 2]);
    let result = final_result.expect("run-end must be emitted");
    assert_eq!(result.content, "done");
    assert!(result.handoff.is_none());
}

/// Scenario 5: handoff cap. A cycle between two agents is bounded at
/// `MAX_HANDOFF_DEPTH` (10); the chain terminates instead of looping
/// forever, and no stream events are emitted past the forced `run-end`.
#[tokio::test]
async fn handoff_cycle_is_capped_at_max_depth() {
    let mut a1_script = Vec::new();
    let mut a2_script = Vec::new();
    for _ in 0..6 {
        a1_script.push(ModelCallResult {
            text: String::new(),
            tool_calls: vec![ModelToolCall {
                id: "c1".into(),
                name: "handoff_to_agent".into(),
                params: serde_json::json!({"agentId": "a2"}),
            }],
            usage: TokenUsage::default(),
        });
        a2_script.push(ModelCallResult {
            text: "a2 says hi".into(),
            tool_calls: vec![ModelToolCall {
                id: "c2".into(),
                name: "handoff_to_agent".into(),
                params: serde_json::json!({"agentId": "a1"}),
            }],
            usage: TokenUsage::default(),
        });
    }
    let mut scripts = HashMap::new();
    scripts.insert("a1".to_string(), a1_script);
    scripts.insert("a2".to_string(), a2_script);
    let provider = Arc::new(ScriptedModelProvider::new(scripts));

    let engine = Engine::new(
        EngineConfig::default(),
        provider,
        Arc::new(InMemoryConversationStore::default()),
        Arc::new(ToolRegistry::new()),
        None,
        None,
        vec![agent("a1", 1), agent("a2", 1)],
        vec![],
        None,
        None,
        None,
        None,
        Some("a1".to_string()),
    )
    .unwrap();

    let mut receiver = engine
        .turn_coordinator
        .clone()
        .stream_message(
            "start".to_string(),
            TurnOptions {
                conversation_id: Some("conv-cycle".to_string()),
                require_conversation_id: true,
            },
        )
        .await
        .unwrap();

    let mut handoff_starts = 0u32;
    let mut saw_run_end = false;
    while let Some(event) = receiver.recv().await {
        assert!(!saw_run_end, "no events may follow run-end");
        match event.kind {
            StreamEventKind::HandoffStart { .. } => handoff_starts += 1,
            StreamEventKind::RunEnd { .. } => saw_run_end = true,
            _ => {}
        }
    }

    assert_eq!(handoff_starts, 10);
    assert!(saw_run_end);
}
