// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tool definitions, capability inference, and retry policy (spec §3, §4.1).

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::schema::Schema;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    Destructive,
    External,
    Custom(String),
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Read => write!(f, "read"),
            Capability::Destructive => write!(f, "destructive"),
            Capability::External => write!(f, "external"),
            Capability::Custom(s) => write!(f, "{s}"),
        }
    }
}

/// A tool the Tool Invoker can call. The invoker body is held separately,
/// in the registry's own invoker map, because `ToolDefinition` must stay
/// `Clone + Serialize` for reuse across conversations while an invoker
/// closure generally is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub input_schema: Option<Schema>,
    pub success_schema: Option<Schema>,
    pub failure_schema: Option<Schema>,
    /// Manually supplied tags, in insertion order. Inferred tags are kept
    /// separately and appended in `capabilities()` so this field alone
    /// reflects exactly what the caller wrote (spec §4.1 ordering rule).
    #[serde(default)]
    pub manual_capabilities: Vec<Capability>,
    pub strict: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ToolDefinitionError {
    #[error("strict tool '{0}' requires an input schema")]
    StrictToolMissingSchema(String),
}

impl ToolDefinition {
    pub fn validate(&self) -> Result<(), ToolDefinitionError> {
        if self.strict && self.input_schema.is_none() {
            return Err(ToolDefinitionError::StrictToolMissingSchema(self.id.clone()));
        }
        Ok(())
    }

    /// Full capability set: manual tags (insertion order) followed by the
    /// alphabetically sorted inferred set, per spec §4.1. Pure — reads
    /// only `self`, performs no mutation, and is safe to call repeatedly.
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut inferred: Vec<Capability> = infer_capabilities(self).into_iter().collect();
        inferred.sort_by(|a, b| a.to_string().cmp(&b.to_string()));

        let mut manual_seen: BTreeSet<Capability> = BTreeSet::new();
        let mut out = Vec::with_capacity(self.manual_capabilities.len() + inferred.len());
        for cap in &self.manual_capabilities {
            out.push(cap.clone());
            manual_seen.insert(cap.clone());
        }
        for cap in inferred {
            if !manual_seen.contains(&cap) {
                out.push(cap);
            }
        }
        out
    }
}

static READ_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(get|list|read|search|fetch|lookup|show|describe)\b").unwrap()
});
static DESTRUCTIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(delete|remove|drop|destroy|purge|wipe)\b").unwrap()
});
static EXTERNAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(endpoint|remote api|callback url|http)").unwrap()
});

/// Capability inference (spec §4.1): pure, deterministic, runs once at
/// registration over an immutable view of the tool. Never mutates `tool`.
pub fn infer_capabilities(tool: &ToolDefinition) -> BTreeSet<Capability> {
    let mut caps = BTreeSet::new();
    let id_and_name = format!("{} {}", tool.id, tool.name);

    if READ_PATTERN.is_match(&id_and_name) {
        caps.insert(Capability::Read);
    }
    if DESTRUCTIVE_PATTERN.is_match(&id_and_name) {
        caps.insert(Capability::Destructive);
    }

    let mut descriptions = vec![tool.description.as_str()];
    if let Some(schema) = &tool.input_schema {
        schema.collect_descriptions(&mut descriptions);
    }
    if descriptions.iter().any(|d| EXTERNAL_PATTERN.is_match(d)) {
        caps.insert(Capability::External);
    }

    caps
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 1000,
            max_backoff_ms: 10_000,
            jitter_ms: 200,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RetryPolicyError {
    #[error("backoff_ms must be <= max_backoff_ms")]
    BackoffExceedsMax,
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), RetryPolicyError> {
        if self.backoff_ms > self.max_backoff_ms {
            return Err(RetryPolicyError::BackoffExceedsMax);
        }
        Ok(())
    }

    /// `backoff(i) = min(backoffMs * 2^i, maxBackoffMs) + uniform[0, jitterMs)` (spec §4.4 step 5).
    pub fn backoff_ms_for_attempt(&self, attempt: u32, jitter_sample: u64) -> u64 {
        let exp = self.backoff_ms.saturating_mul(1u64 << attempt.min(32));
        let capped = exp.min(self.max_backoff_ms);
        capped + (jitter_sample % self.jitter_ms.max(1))
    }
}
