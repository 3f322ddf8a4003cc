// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tool Gate policy model: rules, bundles, and the decision they produce
//! (spec §3, §4.3).

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    DenyOverrides,
    AllowOverrides,
}

impl Default for ConflictResolution {
    fn default() -> Self {
        Self::DenyOverrides
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Equals,
    NotEquals,
    In,
    NotIn,
    Exists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCondition {
    /// One of `role`, `userId`, or a `metadata.<key>` path.
    pub field: String,
    pub op: ConditionOp,
    #[serde(default)]
    pub values: Vec<String>,
}

/// The ambient facts a condition is evaluated against — a snapshot of the
/// caller identity and routing context for one tool-gate decision.
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    pub role: Option<String>,
    pub user_id: Option<String>,
    pub intent_id: Option<String>,
    pub agent_id: Option<String>,
    pub metadata: std::collections::HashMap<String, String>,
}

impl PolicyContext {
    fn field_value(&self, field: &str) -> Option<&str> {
        match field {
            "role" => self.role.as_deref(),
            "userId" => self.user_id.as_deref(),
            _ => field
                .strip_prefix("metadata.")
                .and_then(|key| self.metadata.get(key))
                .map(String::as_str),
        }
    }

    /// `sessionKey = ctx.metadata.conversationId ?? ctx.userId` (spec §4.3).
    pub fn session_key(&self) -> Option<&str> {
        self.metadata
            .get("conversationId")
            .map(String::as_str)
            .or(self.user_id.as_deref())
    }
}

impl PolicyCondition {
    pub fn is_satisfied(&self, ctx: &PolicyContext) -> bool {
        let actual = ctx.field_value(&self.field);
        match self.op {
            ConditionOp::Exists => actual.is_some(),
            ConditionOp::Equals => actual.is_some_and(|v| self.values.first().is_some_and(|e| e == v)),
            ConditionOp::NotEquals => {
                actual.is_none_or(|v| self.values.first().is_none_or(|e| e != v))
            }
            ConditionOp::In => actual.is_some_and(|v| self.values.iter().any(|e| e == v)),
            ConditionOp::NotIn => actual.is_none_or(|v| !self.values.iter().any(|e| e == v)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyRule {
    #[serde(default)]
    pub allow: BTreeSet<String>,
    #[serde(default)]
    pub deny: BTreeSet<String>,
    #[serde(default)]
    pub require_approval: BTreeSet<String>,
    #[serde(default)]
    pub required_categories: Option<BTreeSet<String>>,
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,
    #[serde(default)]
    pub conditions: Vec<PolicyCondition>,
}

impl PolicyRule {
    fn applies(&self, ctx: &PolicyContext) -> bool {
        self.conditions.iter().all(|c| c.is_satisfied(ctx))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideTarget {
    pub id: String,
    pub intent_id: Option<String>,
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PolicyOverride {
    pub target: OverrideTarget,
    pub rule: PolicyRule,
}

#[derive(Debug, Clone, Default)]
pub struct PolicyBundle {
    pub default: PolicyRule,
    pub per_intent: std::collections::HashMap<String, PolicyRule>,
    pub per_agent: std::collections::HashMap<String, PolicyRule>,
    pub overrides: Vec<PolicyOverride>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyBundleError {
    #[error("override '{0}' targets both an unknown intent and an unknown agent")]
    OverrideTargetsUnknownEntities(String),
    #[error("duplicate override id '{0}'")]
    DuplicateOverrideId(String),
    #[error("rule for '{0}' has overlapping allow and deny sets")]
    OverlappingAllowDeny(String),
}

impl PolicyBundle {
    pub fn validate(&self) -> Result<(), PolicyBundleError> {
        let mut seen_ids = HashSet::new();
        for ov in &self.overrides {
            if !seen_ids.insert(ov.target.id.clone()) {
                return Err(PolicyBundleError::DuplicateOverrideId(ov.target.id.clone()));
            }
            let intent_known = ov
                .target
                .intent_id
                .as_ref()
                .is_none_or(|id| self.per_intent.contains_key(id));
            let agent_known = ov
                .target
                .agent_id
                .as_ref()
                .is_none_or(|id| self.per_agent.contains_key(id));
            if !intent_known && !agent_known {
                return Err(PolicyBundleError::OverrideTargetsUnknownEntities(
                    ov.target.id.clone(),
                ));
            }
            check_disjoint(&ov.rule, &ov.target.id)?;
        }
        check_disjoint(&self.default, "default")?;
        for (id, rule) in &self.per_intent {
            check_disjoint(rule, id)?;
        }
        for (id, rule) in &self.per_agent {
            check_disjoint(rule, id)?;
        }
        Ok(())
    }
}

fn check_disjoint(rule: &PolicyRule, label: &str) -> Result<(), PolicyBundleError> {
    if rule.allow.intersection(&rule.deny).next().is_some() {
        return Err(PolicyBundleError::OverlappingAllowDeny(label.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolGateDecision {
    pub tool_id: String,
    pub allowed: bool,
    pub require_approval: bool,
    pub matched_rules: Vec<String>,
    pub denied_by: Option<String>,
}

/// Accumulates allow/deny/require-approval membership across layers in
/// composition order, applying `conflict_resolution` once per layer so
/// that composing `default + intent` then `+ agent` is the same as
/// composing all three at once (spec §8 associativity property).
#[derive(Debug, Clone, Default)]
pub struct GateAccumulator {
    pub allowed: bool,
    pub denied: bool,
    pub require_approval: bool,
    pub matched_rules: Vec<String>,
    pub denied_by: Option<String>,
}

impl GateAccumulator {
    pub fn apply_layer(&mut self, label: &str, rule: &PolicyRule, tool_id: &str, ctx: &PolicyContext) {
        if !rule.applies(ctx) {
            return;
        }
        let allow_hit = rule.allow.contains(tool_id);
        let deny_hit = rule.deny.contains(tool_id);
        if !allow_hit && !deny_hit && rule.require_approval.is_empty() {
            return;
        }
        if allow_hit || deny_hit {
            self.matched_rules.push(label.to_string());
        }
        match rule.conflict_resolution {
            ConflictResolution::DenyOverrides => {
                if deny_hit {
                    self.denied = true;
                    self.denied_by = Some(label.to_string());
                } else if allow_hit {
                    self.allowed = true;
                }
            }
            ConflictResolution::AllowOverrides => {
                if allow_hit {
                    self.allowed = true;
                    self.denied = false;
                } else if deny_hit && !self.allowed {
                    self.denied = true;
                    self.denied_by = Some(label.to_string());
                }
            }
        }
        if rule.require_approval.contains(tool_id) {
            self.require_approval = true;
        }
    }

    pub fn finish(self, tool_id: &str) -> ToolGateDecision {
        let allowed = self.allowed && !self.denied;
        ToolGateDecision {
            tool_id: tool_id.to_string(),
            allowed,
            require_approval: self.require_approval && allowed,
            matched_rules: self.matched_rules,
            denied_by: self.denied_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow_rule(tools: &[&str]) -> PolicyRule {
        PolicyRule {
            allow: tools.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn deny_rule(tools: &[&str]) -> PolicyRule {
        PolicyRule {
            deny: tools.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn deny_overrides_allow_by_default() {
        let mut acc = GateAccumulator::default();
        let ctx = PolicyContext::default();
        acc.apply_layer("default", &allow_rule(&["admin_tool"]), "admin_tool", &ctx);
        acc.apply_layer("agent", &deny_rule(&["admin_tool"]), "admin_tool", &ctx);
        let decision = acc.finish("admin_tool");
        assert!(!decision.allowed);
        assert_eq!(decision.denied_by.as_deref(), Some("agent"));
    }

    #[test]
    fn composition_is_associative() {
        let ctx = PolicyContext::default();
        let default = allow_rule(&["search"]);
        let intent = deny_rule(&["search"]);
        let agent = allow_rule(&["search"]);

        let mut incremental = GateAccumulator::default();
        incremental.apply_layer("default", &default, "search", &ctx);
        incremental.apply_layer("intent", &intent, "search", &ctx);
        let after_two = incremental.clone();
        incremental.apply_layer("agent", &agent, "search", &ctx);
        let all_at_once = incremental.clone();

        let mut from_scratch = after_two;
        from_scratch.apply_layer("agent", &agent, "search", &ctx);

        assert_eq!(
            all_at_once.finish("search"),
            from_scratch.finish("search")
        );
    }

    #[test]
    fn bundle_rejects_overlapping_allow_deny() {
        let bundle = PolicyBundle {
            default: PolicyRule {
                allow: ["x".to_string()].into(),
                deny: ["x".to_string()].into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn bundle_rejects_override_targeting_unknown_entities() {
        let bundle = PolicyBundle {
            overrides: vec![PolicyOverride {
                target: OverrideTarget {
                    id: "ov1".into(),
                    intent_id: Some("ghost-intent".into()),
                    agent_id: None,
                },
                rule: PolicyRule::default(),
            }],
            ..Default::default()
        };
        assert_eq!(
            bundle.validate(),
            Err(PolicyBundleError::OverrideTargetsUnknownEntities("ov1".into()))
        );
    }
}
