// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Engine configuration, loaded from `AGENTFLOW_`-prefixed environment
//! variables with sane defaults. Config *file* parsing is an out-of-scope
//! external collaborator; reading process environment is the ambient
//! concern every long-running teacher service performs.

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub approval_ttl_ms: u64,
    pub max_message_chars: usize,
    pub default_semantic_threshold: f64,
    pub metrics_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            approval_ttl_ms: 300_000,
            max_message_chars: 32_000,
            default_semantic_threshold: 0.6,
            metrics_enabled: false,
        }
    }
}

impl EngineConfig {
    /// Overlays defaults with whatever `AGENTFLOW_*` variables are set in
    /// the process environment. Malformed values fall back to the default
    /// rather than failing startup, since a typo'd override should degrade
    /// to known-good behavior, not take the process down.
    pub fn from_env() -> Self {
        Self::from_env_reader(|key| std::env::var(key).ok())
    }

    /// Testable seam: takes a lookup function instead of touching
    /// `std::env` directly so overlay behavior can be verified without
    /// mutating global process state.
    pub fn from_env_reader(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            log_level: get("AGENTFLOW_LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: get("AGENTFLOW_LOG_FORMAT")
                .map(|v| match v.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                })
                .unwrap_or(defaults.log_format),
            approval_ttl_ms: get("AGENTFLOW_APPROVAL_TTL_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.approval_ttl_ms),
            max_message_chars: get("AGENTFLOW_MAX_MESSAGE_CHARS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_message_chars),
            default_semantic_threshold: get("AGENTFLOW_DEFAULT_SEMANTIC_THRESHOLD")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_semantic_threshold),
            metrics_enabled: get("AGENTFLOW_METRICS_ENABLED")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.metrics_enabled),
        }
    }
}
