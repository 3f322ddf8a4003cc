// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Router (C8): deterministic selection of an agent, pipeline, or intent
//! target for a user message (spec §4.8).

use regex::Regex;

use crate::domain::agent::AgentConfig;
use crate::domain::matching::{IntentMatcher, MessageRouter, MessageRouterResult, SemanticMatcher};
use crate::domain::pipeline::PipelineConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum RouteVia {
    MessageRouter,
    UtteranceExact,
    UtteranceRegex,
    UtteranceSemantic,
    Intent,
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteTarget {
    Agent {
        id: String,
        confidence: f64,
        via: RouteVia,
    },
    Pipeline {
        id: String,
        confidence: f64,
        via: RouteVia,
    },
    PrecomputedResponse(Box<crate::domain::events::TurnResult>),
}

pub struct Router {
    message_router: Option<Box<dyn MessageRouter>>,
    semantic_matcher: Option<Box<dyn SemanticMatcher>>,
    intent_matcher: Option<Box<dyn IntentMatcher>>,
    default_agent_id: Option<String>,
}

impl Router {
    pub fn new(
        message_router: Option<Box<dyn MessageRouter>>,
        semantic_matcher: Option<Box<dyn SemanticMatcher>>,
        intent_matcher: Option<Box<dyn IntentMatcher>>,
        default_agent_id: Option<String>,
    ) -> Self {
        Self {
            message_router,
            semantic_matcher,
            intent_matcher,
            default_agent_id,
        }
    }

    /// Selects a target per spec §4.8's five-step procedure. `agents` and
    /// `pipelines` are consulted in registration order (tie-break: first
    /// registered wins within a class; agents outrank pipelines outrank
    /// intents outrank the default).
    pub async fn route(
        &self,
        message: &str,
        agents: &[AgentConfig],
        pipelines: &[PipelineConfig],
    ) -> Option<RouteTarget> {
        if let Some(router) = &self.message_router {
            if let Some(result) = router.route(message).await {
                return Some(match result {
                    MessageRouterResult::Agent(id) => RouteTarget::Agent {
                        id,
                        confidence: 1.0,
                        via: RouteVia::MessageRouter,
                    },
                    MessageRouterResult::Fallback(id) => RouteTarget::Agent {
                        id,
                        confidence: 1.0,
                        via: RouteVia::MessageRouter,
                    },
                });
            }
        }

        if let Some((id, confidence, via)) = self
            .match_utterances(message, agents.iter().map(|a| (a.id.as_str(), a.utterances.as_slice())))
            .await
        {
            return Some(RouteTarget::Agent { id, confidence, via });
        }

        if let Some((id, confidence, via)) = self
            .match_utterances(
                message,
                pipelines.iter().map(|p| (p.id.as_str(), p.utterances.as_slice())),
            )
            .await
        {
            return Some(RouteTarget::Pipeline { id, confidence, via });
        }

        if let Some(matcher) = &self.intent_matcher {
            if let Some(intent_match) = matcher.match_intent(message).await {
                return Some(match intent_match.target {
                    crate::domain::matching::IntentTarget::Agent(id) => RouteTarget::Agent {
                        id,
                        confidence: 1.0,
                        via: RouteVia::Intent,
                    },
                    crate::domain::matching::IntentTarget::PrecomputedResponse(result) => {
                        RouteTarget::PrecomputedResponse(result)
                    }
                });
            }
        }

        self.default_agent_id.clone().map(|id| RouteTarget::Agent {
            id,
            confidence: 1.0,
            via: RouteVia::Default,
        })
    }

    /// Exact (case-insensitive, trimmed) match first, then partial regex
    /// match, then external semantic match (spec §4.8 step 2). Invalid
    /// regex patterns are skipped silently.
    async fn match_utterances<'a>(
        &self,
        message: &str,
        entities: impl Iterator<Item = (&'a str, &'a [String])>,
    ) -> Option<(String, f64, RouteVia)> {
        let normalized = message.trim().to_lowercase();
        let entities: Vec<(&str, &[String])> = entities.collect();

        for (id, utterances) in &entities {
            for utterance in *utterances {
                if utterance.trim().to_lowercase() == normalized {
                    return Some((id.to_string(), 1.0, RouteVia::UtteranceExact));
                }
            }
        }

        for (id, utterances) in &entities {
            for utterance in *utterances {
                let Ok(pattern) = Regex::new(&format!("(?i){utterance}")) else {
                    continue;
                };
                if pattern.is_match(message) {
                    return Some((id.to_string(), 0.8, RouteVia::UtteranceRegex));
                }
            }
        }

        if let Some(matcher) = &self.semantic_matcher {
            for (id, utterances) in &entities {
                if utterances.is_empty() {
                    continue;
                }
                if let Some(semantic_match) = matcher.match_utterance(message, utterances).await {
                    return Some((id.to_string(), semantic_match.confidence, RouteVia::UtteranceSemantic));
                }
            }
        }

        None
    }
}
