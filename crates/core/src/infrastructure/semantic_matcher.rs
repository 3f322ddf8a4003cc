// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! `SemanticMatcher` reference implementation. Real semantic-similarity
//! matching is an out-of-scope external collaborator (spec §1); this is a
//! deterministic token-overlap matcher so the Router's semantic step (spec
//! §4.8 step 2) is exercisable without an embedding model.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::matching::{SemanticMatch, SemanticMatcher};

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Scores each utterance by word-level Jaccard similarity against the
/// message and returns the best match above `threshold`. The Router
/// already applies its own `semanticThreshold` before trusting the
/// confidence this returns; this matcher's own threshold guards against
/// returning a near-zero-confidence "best of a bad lot" match.
pub struct TokenOverlapMatcher {
    threshold: f64,
}

impl TokenOverlapMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for TokenOverlapMatcher {
    fn default() -> Self {
        Self::new(0.3)
    }
}

#[async_trait]
impl SemanticMatcher for TokenOverlapMatcher {
    async fn match_utterance(&self, message: &str, utterances: &[String]) -> Option<SemanticMatch> {
        let message_tokens = tokenize(message);
        utterances
            .iter()
            .map(|utterance| SemanticMatch {
                confidence: jaccard(&message_tokens, &tokenize(utterance)),
                utterance: utterance.clone(),
            })
            .filter(|m| m.confidence >= self.threshold)
            .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matches_the_closest_utterance_above_threshold() {
        let matcher = TokenOverlapMatcher::new(0.2);
        let utterances = vec!["cancel my order".to_string(), "track my package".to_string()];
        let result = matcher.match_utterance("I want to cancel the order I placed", &utterances).await;
        assert_eq!(result.unwrap().utterance, "cancel my order");
    }

    #[tokio::test]
    async fn returns_none_when_nothing_clears_the_threshold() {
        let matcher = TokenOverlapMatcher::new(0.9);
        let utterances = vec!["cancel my order".to_string()];
        assert!(matcher.match_utterance("completely unrelated text", &utterances).await.is_none());
    }
}
