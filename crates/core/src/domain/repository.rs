// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! The `ConversationStore` repository interface (spec §6 consumed
//! interfaces). A production deployment supplies its own implementation
//! (Postgres-backed, SQLite-backed, ...); the engine only depends on this
//! trait, never a concrete store.

use async_trait::async_trait;
use thiserror::Error;

use super::message::{Conversation, Message};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("conversation '{0}' not found")]
    NotFound(String),
}

/// Contracts (spec §6): `set` atomically replaces a conversation's entire
/// message list; message appends are durable before the call returns;
/// insertion order is preserved regardless of backend (file-backed,
/// remote); a conversation and its messages are loadable in one logical
/// read via `get`.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Conversation>, StoreError>;
    async fn set(&self, conversation: Conversation) -> Result<(), StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
    async fn add_message(&self, id: &str, message: Message) -> Result<(), StoreError>;
    async fn add_messages(&self, id: &str, messages: Vec<Message>) -> Result<(), StoreError>;
    async fn get_history(&self, id: &str) -> Result<Vec<Message>, StoreError>;
}
