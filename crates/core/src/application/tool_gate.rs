// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tool Gate (C3): stateless per-decision evaluation backed by a
//! `PolicyBundle`, plus the approval store (spec §4.3).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::domain::policy::{GateAccumulator, PolicyBundle, PolicyContext, ToolGateDecision};

#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub tool_id: String,
    pub session_key: String,
    pub prompt: String,
    pub ttl_ms: u64,
}

struct ApprovalRecord {
    granted_at: Instant,
    ttl: Duration,
}

impl ApprovalRecord {
    fn is_live(&self) -> bool {
        self.granted_at.elapsed() < self.ttl
    }
}

const DEFAULT_APPROVAL_TTL_MS: u64 = 300_000;

/// Keyed by `(toolId, sessionKey)` (spec §4.3); each key's reads/writes
/// are independent and must not block model calls, hence a plain
/// `RwLock<HashMap>` rather than anything coarser.
#[derive(Default)]
struct ApprovalStore {
    grants: RwLock<std::collections::HashMap<(String, String), ApprovalRecord>>,
}

impl ApprovalStore {
    async fn has_approval(&self, tool_id: &str, session_key: &str) -> bool {
        let grants = self.grants.read().await;
        grants
            .get(&(tool_id.to_string(), session_key.to_string()))
            .is_some_and(ApprovalRecord::is_live)
    }

    async fn record_approval(&self, tool_id: &str, session_key: &str, ttl_ms: u64) {
        let mut grants = self.grants.write().await;
        grants.insert(
            (tool_id.to_string(), session_key.to_string()),
            ApprovalRecord {
                granted_at: Instant::now(),
                ttl: Duration::from_millis(ttl_ms),
            },
        );
    }

    async fn clear(&self, session_key: &str) {
        let mut grants = self.grants.write().await;
        grants.retain(|(_, key), _| key != session_key);
    }
}

/// Bundle pointer is immutable after `set_policies`; reloading atomically
/// swaps it (spec §5 shared-resource policy).
pub struct ToolGate {
    bundle: RwLock<Arc<PolicyBundle>>,
    approvals: ApprovalStore,
    approval_ttl_ms: u64,
}

impl ToolGate {
    pub fn new(bundle: PolicyBundle, approval_ttl_ms: u64) -> Self {
        Self {
            bundle: RwLock::new(Arc::new(bundle)),
            approvals: ApprovalStore::default(),
            approval_ttl_ms,
        }
    }

    pub fn with_default_ttl(bundle: PolicyBundle) -> Self {
        Self::new(bundle, DEFAULT_APPROVAL_TTL_MS)
    }

    pub async fn set_policies(&self, bundle: PolicyBundle) {
        *self.bundle.write().await = Arc::new(bundle);
    }

    /// Composes rules in layered order: default → intent → agent →
    /// matching overrides, in declaration order (spec §4.3).
    pub async fn evaluate(&self, tool_id: &str, ctx: &PolicyContext) -> ToolGateDecision {
        let bundle = self.bundle.read().await.clone();
        let mut acc = GateAccumulator::default();

        acc.apply_layer("default", &bundle.default, tool_id, ctx);

        if let Some(intent_id) = &ctx.intent_id {
            if let Some(rule) = bundle.per_intent.get(intent_id) {
                acc.apply_layer("intent", rule, tool_id, ctx);
            }
        }
        if let Some(agent_id) = &ctx.agent_id {
            if let Some(rule) = bundle.per_agent.get(agent_id) {
                acc.apply_layer("agent", rule, tool_id, ctx);
            }
        }
        for ov in &bundle.overrides {
            let intent_matches = ov
                .target
                .intent_id
                .as_ref()
                .is_some_and(|id| ctx.intent_id.as_deref() == Some(id.as_str()));
            let agent_matches = ov
                .target
                .agent_id
                .as_ref()
                .is_some_and(|id| ctx.agent_id.as_deref() == Some(id.as_str()));
            if intent_matches || agent_matches {
                acc.apply_layer(&ov.target.id, &ov.rule, tool_id, ctx);
            }
        }

        acc.finish(tool_id)
    }

    /// A `Filter` operation over an entire tool list, preserving input
    /// order (spec §4.3).
    pub async fn filter(
        &self,
        tool_ids: &[String],
        ctx: &PolicyContext,
    ) -> (Vec<String>, Vec<ToolGateDecision>) {
        let mut allowed = Vec::new();
        let mut denied = Vec::new();
        for id in tool_ids {
            let decision = self.evaluate(id, ctx).await;
            if decision.allowed {
                allowed.push(id.clone());
            } else {
                denied.push(decision);
            }
        }
        (allowed, denied)
    }

    pub async fn has_approval(&self, tool_id: &str, session_key: &str) -> bool {
        self.approvals.has_approval(tool_id, session_key).await
    }

    pub async fn record_approval(&self, tool_id: &str, session_key: &str) {
        self.approvals
            .record_approval(tool_id, session_key, self.approval_ttl_ms)
            .await;
    }

    pub async fn clear_approvals(&self, session_key: &str) {
        self.approvals.clear(session_key).await;
    }

    /// Returns `None` if the decision carries no approvable scope (spec
    /// §4.3 `createApprovalRequest`).
    pub fn create_approval_request(
        &self,
        decision: &ToolGateDecision,
        session_key: &str,
    ) -> Option<ApprovalRequest> {
        if !decision.require_approval {
            return None;
        }
        Some(ApprovalRequest {
            tool_id: decision.tool_id.clone(),
            session_key: session_key.to_string(),
            prompt: format!("Tool '{}' requires approval before it can run", decision.tool_id),
            ttl_ms: self.approval_ttl_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::PolicyRule;

    fn bundle_denying(tool: &str) -> PolicyBundle {
        PolicyBundle {
            default: PolicyRule {
                deny: [tool.to_string()].into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn denied_tool_is_never_approvable() {
        let gate = ToolGate::with_default_ttl(bundle_denying("admin_tool"));
        let decision = gate.evaluate("admin_tool", &PolicyContext::default()).await;
        assert!(!decision.allowed);
        assert!(!decision.require_approval);
    }

    #[tokio::test]
    async fn approval_round_trip() {
        let bundle = PolicyBundle {
            default: PolicyRule {
                allow: ["pay".to_string()].into(),
                require_approval: ["pay".to_string()].into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let gate = ToolGate::with_default_ttl(bundle);
        let decision = gate.evaluate("pay", &PolicyContext::default()).await;
        assert!(decision.allowed);
        assert!(decision.require_approval);

        assert!(!gate.has_approval("pay", "session-1").await);
        gate.record_approval("pay", "session-1").await;
        assert!(gate.has_approval("pay", "session-1").await);

        gate.clear_approvals("session-1").await;
        assert!(!gate.has_approval("pay", "session-1").await);
    }

    #[tokio::test]
    async fn filter_preserves_input_order() {
        let bundle = PolicyBundle {
            default: PolicyRule {
                allow: ["a".to_string(), "c".to_string()].into(),
                deny: ["b".to_string()].into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let gate = ToolGate::with_default_ttl(bundle);
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let (allowed, denied) = gate.filter(&ids, &PolicyContext::default()).await;
        assert_eq!(allowed, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].tool_id, "b");
    }
}
