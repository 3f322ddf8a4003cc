// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! `ModelProvider` — the anti-corruption layer between the engine and a
//! concrete model backend (spec §6 consumed interfaces). The engine is
//! provider-agnostic; implementations live in `infrastructure`.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use super::agent::{ModelCoordinates, ToolChoiceDirective};
use super::message::Message;
use super::tool::ToolDefinition;

#[derive(Debug, Clone)]
pub struct ModelPrompt {
    pub system: String,
    pub history: Vec<Message>,
    pub user_message: String,
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub toolkit: Vec<ToolDefinition>,
    pub tool_choice: ToolChoiceDirective,
    pub max_steps: u32,
    pub temperature_millis: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelToolCall {
    pub id: String,
    pub name: String,
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelCallResult {
    pub text: String,
    pub tool_calls: Vec<ModelToolCall>,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelStreamEvent {
    TextDelta(String),
    ToolCall(ModelToolCall),
    Done { usage: TokenUsage },
}

#[derive(Debug, thiserror::Error)]
pub enum ModelProviderError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("rate limit exceeded")]
    RateLimit,
    #[error("model '{0}' not found")]
    ModelNotFound(String),
    #[error("provider error: {0}")]
    Provider(String),
}

pub type ModelEventStream =
    Pin<Box<dyn Stream<Item = Result<ModelStreamEvent, ModelProviderError>> + Send>>;

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Resolves model coordinates into a concrete handle. Implementations
    /// may use this to validate the model name/provider id eagerly.
    async fn resolve(&self, coords: &ModelCoordinates) -> Result<(), ModelProviderError>;

    async fn generate_text(
        &self,
        coords: &ModelCoordinates,
        prompt: &ModelPrompt,
        options: &GenerateOptions,
    ) -> Result<ModelCallResult, ModelProviderError>;

    async fn stream_text(
        &self,
        coords: &ModelCoordinates,
        prompt: &ModelPrompt,
        options: &GenerateOptions,
    ) -> Result<ModelEventStream, ModelProviderError>;
}
