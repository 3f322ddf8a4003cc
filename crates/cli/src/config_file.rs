// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Agent configuration file format (SPEC_FULL §6.2), grounded on the
//! teacher's `infrastructure::workflow_parser` YAML-loading pattern: read
//! the whole file, deserialize with `serde_yaml`, surface parse failures
//! with the offending path attached rather than a bare serde error.

use std::path::Path;

use agentflow_core::domain::agent::AgentConfig;
use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AgentFileConfig {
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub default_agent_id: Option<String>,
}

pub fn load(path: &Path) -> Result<AgentFileConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read agent config at {}", path.display()))?;
    let config: AgentFileConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse agent config at {}", path.display()))?;
    for agent in &config.agents {
        agent
            .validate()
            .with_context(|| format!("agent '{}' in {} is invalid", agent.id, path.display()))?;
    }
    Ok(config)
}
