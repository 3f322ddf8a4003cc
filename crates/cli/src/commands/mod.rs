// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

pub mod run;
pub mod stream;

use std::sync::Arc;

use agentflow_core::application::tool_registry::ToolRegistry;
use agentflow_core::domain::agent::AgentConfig;
use agentflow_core::infrastructure::{
    EchoModelProvider, EngineConfig, InMemoryConversationStore, TokenOverlapMatcher,
};
use agentflow_core::Engine;
use anyhow::Result;

use crate::config_file::AgentFileConfig;

/// Builds an `Engine` wired to the offline reference implementations
/// (`EchoModelProvider`, `InMemoryConversationStore`) from a loaded agent
/// config file. This is the CLI's "no real model, no real database" mode
/// (SPEC_FULL §6.1) -- swapping in production adapters is an application
/// concern, not something this binary does.
pub fn build_offline_engine(config: AgentFileConfig) -> Result<Engine> {
    let utterances: Vec<String> = config
        .agents
        .iter()
        .flat_map(|a: &AgentConfig| a.utterances.clone())
        .collect();
    let semantic_matcher: Option<Box<dyn agentflow_core::domain::matching::SemanticMatcher>> =
        if utterances.is_empty() {
            None
        } else {
            Some(Box::new(TokenOverlapMatcher::default()))
        };

    let engine = Engine::new(
        EngineConfig::default(),
        Arc::new(EchoModelProvider),
        Arc::new(InMemoryConversationStore::default()),
        Arc::new(ToolRegistry::new()),
        None,
        None,
        config.agents,
        vec![],
        None,
        None,
        semantic_matcher,
        None,
        config.default_agent_id,
    )?;
    Ok(engine)
}
