// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Agent configuration — the id, prompt, model coordinates, and policy
//! knobs that drive a single Agent Step Loop run.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::tool::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCoordinates {
    pub provider_id: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_millis: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    Required,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolChoiceDirective {
    pub mode: ToolChoice,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

impl Default for ToolChoiceDirective {
    fn default() -> Self {
        Self {
            mode: ToolChoice::Auto,
            tool: None,
        }
    }
}

fn default_max_steps() -> u32 {
    20
}

fn default_tool_timeout_ms() -> u64 {
    300_000
}

fn default_true() -> bool {
    true
}

/// Agent configuration, the unit registered with the Router and driven by
/// the Agent Step Loop. Grounded on the teacher's k8s-manifest-shaped
/// `AgentManifest`, trimmed to what this engine's step loop actually reads;
/// everything else the teacher's manifest carries (scheduling, delivery,
/// volumes) belongs to a deployment layer this engine does not own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub system_prompt_template: String,
    pub model: ModelCoordinates,
    #[serde(default)]
    pub tool_ids: Vec<String>,
    #[serde(default)]
    pub utterances: Vec<String>,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default)]
    pub tool_choice: ToolChoiceDirective,
    #[serde(default = "default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    #[serde(default)]
    pub mcp_server_ids: Vec<String>,
    #[serde(default = "default_true")]
    pub persist_history: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AgentConfigError {
    #[error("agent id must be non-empty and contain no whitespace")]
    InvalidId,
    #[error("max_steps must be >= 1")]
    InvalidMaxSteps,
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), AgentConfigError> {
        if self.id.is_empty() || self.id.chars().any(char::is_whitespace) {
            return Err(AgentConfigError::InvalidId);
        }
        if self.max_steps < 1 {
            return Err(AgentConfigError::InvalidMaxSteps);
        }
        Ok(())
    }

    /// The set of tool names this agent's history filter (spec §4.5.2) and
    /// Tool Gate evaluation should treat as in-scope, as a lookup set.
    pub fn tool_id_set(&self) -> HashSet<&str> {
        self.tool_ids.iter().map(String::as_str).collect()
    }

    /// Non-streaming `processMessage` caps steps at 3 for cost safety
    /// regardless of the configured `max_steps`; the streaming path uses
    /// the full value. Preserved as documented, configurable behavior
    /// rather than removed, per the design note on this exact guard.
    pub fn effective_max_steps(&self, streaming: bool) -> u32 {
        if streaming {
            self.max_steps
        } else {
            self.max_steps.min(3)
        }
    }
}
