// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Optional consumed ports the Router (C8) calls into: a rule-based
//! `MessageRouter`, an external `SemanticMatcher`, and an `IntentMatcher`
//! (spec §4.8, §6).

use async_trait::async_trait;

use super::events::TurnResult;

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticMatch {
    pub confidence: f64,
    pub utterance: String,
}

/// `(message, utterances) -> {matched, confidence, utterance?}` (spec §6).
/// Absence of a match is `None` rather than a zero-confidence `Some`.
#[async_trait]
pub trait SemanticMatcher: Send + Sync {
    async fn match_utterance(&self, message: &str, utterances: &[String]) -> Option<SemanticMatch>;
}

#[derive(Debug, Clone)]
pub enum IntentTarget {
    Agent(String),
    /// The matcher already ran a function/pipeline target and is handing
    /// back the finished turn result (spec §4.8 step 4).
    PrecomputedResponse(Box<TurnResult>),
}

#[derive(Debug, Clone)]
pub struct IntentMatch {
    pub intent_id: String,
    pub target: IntentTarget,
}

#[async_trait]
pub trait IntentMatcher: Send + Sync {
    async fn match_intent(&self, message: &str) -> Option<IntentMatch>;
}

#[derive(Debug, Clone)]
pub enum MessageRouterResult {
    Agent(String),
    Fallback(String),
}

/// Consulted first, ahead of utterance/intent matching, when configured
/// (spec §4.8 step 1).
#[async_trait]
pub trait MessageRouter: Send + Sync {
    async fn route(&self, message: &str) -> Option<MessageRouterResult>;
}

/// External collaborator that actually runs a pipeline matched by the
/// Router's utterance step (spec §4.8 step 3). Pipeline execution itself is
/// out of scope for this crate; this port is the seam a host application
/// plugs an executor into.
#[async_trait]
pub trait PipelineExecutor: Send + Sync {
    async fn execute(&self, pipeline_id: &str, message: &str) -> Result<TurnResult, String>;
}
