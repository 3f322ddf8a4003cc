// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! `ModelProvider` reference implementations. Model-provider HTTP clients
//! are an out-of-scope external collaborator (spec §1); these two
//! implementations are deterministic test doubles used to exercise the
//! engine without a real backend, grounded on the teacher's
//! `infrastructure::llm::registry::ProviderRegistry` adapter idiom.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::agent::ModelCoordinates;
use crate::domain::model::{
    GenerateOptions, ModelCallResult, ModelEventStream, ModelPrompt, ModelProvider,
    ModelProviderError, TokenUsage,
};

/// Returns a fixed script of `ModelCallResult`s per provider id, one per
/// call, in order. Exhausting a provider's script is a test-setup bug, not
/// a runtime condition this engine needs to recover from, so it panics.
pub struct ScriptedModelProvider {
    scripts: Mutex<HashMap<String, Vec<ModelCallResult>>>,
}

impl ScriptedModelProvider {
    pub fn new(scripts: HashMap<String, Vec<ModelCallResult>>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedModelProvider {
    async fn resolve(&self, coords: &ModelCoordinates) -> Result<(), ModelProviderError> {
        if self.scripts.lock().unwrap().contains_key(&coords.provider_id) {
            Ok(())
        } else {
            Err(ModelProviderError::ModelNotFound(coords.provider_id.clone()))
        }
    }

    async fn generate_text(
        &self,
        coords: &ModelCoordinates,
        _prompt: &ModelPrompt,
        _options: &GenerateOptions,
    ) -> Result<ModelCallResult, ModelProviderError> {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts
            .get_mut(&coords.provider_id)
            .ok_or_else(|| ModelProviderError::ModelNotFound(coords.provider_id.clone()))?;
        if script.is_empty() {
            panic!("scripted provider '{}' has no more queued responses", coords.provider_id);
        }
        Ok(script.remove(0))
    }

    async fn stream_text(
        &self,
        coords: &ModelCoordinates,
        prompt: &ModelPrompt,
        options: &GenerateOptions,
    ) -> Result<ModelEventStream, ModelProviderError> {
        let result = self.generate_text(coords, prompt, options).await?;
        Ok(Box::pin(tokio_stream::once(Ok(crate::domain::model::ModelStreamEvent::Done {
            usage: result.usage,
        }))))
    }
}

/// Echoes the user message back as the assistant's reply, with no tool
/// calls. Useful as a zero-configuration default when no real provider is
/// wired up yet.
#[derive(Default)]
pub struct EchoModelProvider;

#[async_trait]
impl ModelProvider for EchoModelProvider {
    async fn resolve(&self, _coords: &ModelCoordinates) -> Result<(), ModelProviderError> {
        Ok(())
    }

    async fn generate_text(
        &self,
        coords: &ModelCoordinates,
        prompt: &ModelPrompt,
        _options: &GenerateOptions,
    ) -> Result<ModelCallResult, ModelProviderError> {
        debug!(provider = %coords.provider_id, model = %coords.model, "echo provider generating");
        Ok(ModelCallResult {
            text: prompt.user_message.clone(),
            tool_calls: vec![],
            usage: TokenUsage::default(),
        })
    }

    async fn stream_text(
        &self,
        coords: &ModelCoordinates,
        prompt: &ModelPrompt,
        options: &GenerateOptions,
    ) -> Result<ModelEventStream, ModelProviderError> {
        let result = self.generate_text(coords, prompt, options).await?;
        Ok(Box::pin(tokio_stream::iter(vec![
            Ok(crate::domain::model::ModelStreamEvent::TextDelta(result.text)),
            Ok(crate::domain::model::ModelStreamEvent::Done { usage: result.usage }),
        ])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(id: &str) -> ModelCoordinates {
        ModelCoordinates {
            provider_id: id.to_string(),
            model: "test".into(),
            temperature_millis: None,
            max_tokens: None,
        }
    }

    fn prompt(message: &str) -> ModelPrompt {
        ModelPrompt {
            system: "you are helpful".into(),
            history: vec![],
            user_message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn echo_provider_returns_the_user_message() {
        let provider = EchoModelProvider;
        let result = provider
            .generate_text(&coords("echo"), &prompt("hello there"), &GenerateOptions {
                toolkit: vec![],
                tool_choice: Default::default(),
                max_steps: 1,
                temperature_millis: None,
            })
            .await
            .unwrap();
        assert_eq!(result.text, "hello there");
        assert!(result.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn scripted_provider_serves_responses_in_order() {
        let mut scripts = HashMap::new();
        scripts.insert(
            "p1".to_string(),
            vec![
                ModelCallResult { text: "first".into(), tool_calls: vec![], usage: TokenUsage::default() },
                ModelCallResult { text: "second".into(), tool_calls: vec![], usage: TokenUsage::default() },
            ],
        );
        let provider = ScriptedModelProvider::new(scripts);
        let options = GenerateOptions {
            toolkit: vec![],
            tool_choice: Default::default(),
            max_steps: 1,
            temperature_millis: None,
        };
        let first = provider.generate_text(&coords("p1"), &prompt("x"), &options).await.unwrap();
        let second = provider.generate_text(&coords("p1"), &prompt("x"), &options).await.unwrap();
        assert_eq!(first.text, "first");
        assert_eq!(second.text, "second");
    }

    #[tokio::test]
    async fn resolve_fails_for_unknown_provider() {
        let provider = ScriptedModelProvider::new(HashMap::new());
        let err = provider.resolve(&coords("missing")).await.unwrap_err();
        assert!(matches!(err, ModelProviderError::ModelNotFound(_)));
    }
}
