// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory `ConversationStore` reference implementation. Persistent
//! storage is an out-of-scope external collaborator (spec §1); this impl
//! exists so the engine is runnable and testable without one. Grounded on
//! the teacher's `InMemoryAgentRepository`, but using `tokio::sync::RwLock`
//! rather than a `std::sync::Mutex` because `ConversationStore`'s methods
//! are genuinely async, not sync work wrapped in an async fn.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::message::{Conversation, ConversationPolicy, Message};
use crate::domain::repository::{ConversationStore, StoreError};

#[derive(Clone)]
pub struct InMemoryConversationStore {
    conversations: Arc<RwLock<HashMap<String, Conversation>>>,
    default_policy: ConversationPolicy,
}

impl InMemoryConversationStore {
    pub fn new(default_policy: ConversationPolicy) -> Self {
        Self {
            conversations: Arc::new(RwLock::new(HashMap::new())),
            default_policy,
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new(ConversationPolicy::default())
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self.conversations.read().await.get(id).cloned())
    }

    async fn set(&self, conversation: Conversation) -> Result<(), StoreError> {
        self.conversations
            .write()
            .await
            .insert(conversation.id.clone(), conversation);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.conversations.write().await.remove(id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.conversations.write().await.clear();
        Ok(())
    }

    async fn add_message(&self, id: &str, message: Message) -> Result<(), StoreError> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .entry(id.to_string())
            .or_insert_with(|| Conversation::new(id, self.default_policy.clone()));
        conversation.append(message);
        Ok(())
    }

    async fn add_messages(&self, id: &str, messages: Vec<Message>) -> Result<(), StoreError> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .entry(id.to_string())
            .or_insert_with(|| Conversation::new(id, self.default_policy.clone()));
        for message in messages {
            conversation.append(message);
        }
        Ok(())
    }

    async fn get_history(&self, id: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .conversations
            .read()
            .await
            .get(id)
            .map(|c| c.messages.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_message_creates_conversation_lazily() {
        let store = InMemoryConversationStore::default();
        store
            .add_message("c1", Message::User { text: "hi".into() })
            .await
            .unwrap();
        let history = store.get_history("c1").await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn set_replaces_entire_conversation() {
        let store = InMemoryConversationStore::default();
        store
            .add_message("c1", Message::User { text: "first".into() })
            .await
            .unwrap();
        let mut replacement = Conversation::new("c1", ConversationPolicy::default());
        replacement.append(Message::User { text: "replaced".into() });
        store.set(replacement).await.unwrap();
        let history = store.get_history("c1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(matches!(&history[0], Message::User { text } if text == "replaced"));
    }

    #[tokio::test]
    async fn delete_and_clear_remove_conversations() {
        let store = InMemoryConversationStore::default();
        store
            .add_message("c1", Message::User { text: "hi".into() })
            .await
            .unwrap();
        store.delete("c1").await.unwrap();
        assert!(store.get("c1").await.unwrap().is_none());

        store
            .add_message("c2", Message::User { text: "hi".into() })
            .await
            .unwrap();
        store.clear().await.unwrap();
        assert!(store.get("c2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_history_on_unknown_conversation_is_empty_not_error() {
        let store = InMemoryConversationStore::default();
        assert_eq!(store.get_history("nope").await.unwrap(), Vec::new());
    }
}
