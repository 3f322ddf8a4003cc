// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Conversation & Message domain types (BC: Conversational State).
//!
//! A `Conversation` is an ordered, append-only sequence of `Message`s plus a
//! `ConversationPolicy`. Invariant: system messages are never appended here —
//! they live only in `AgentConfig::system_prompt_template`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationPolicy {
    pub max_messages: Option<usize>,
    pub max_chars: Option<usize>,
    pub strict_lookup: bool,
}

impl Default for ConversationPolicy {
    fn default() -> Self {
        Self {
            max_messages: None,
            max_chars: None,
            strict_lookup: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub policy: ConversationPolicy,
}

impl Conversation {
    pub fn new(id: impl Into<String>, policy: ConversationPolicy) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            policy,
        }
    }

    /// Append a message, enforcing the policy's message/char caps by
    /// trimming the oldest messages first (teacher-style soft eviction,
    /// see `domain::volume` TTL eviction for the analogous pattern).
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
        if let Some(max) = self.policy.max_messages {
            while self.messages.len() > max {
                self.messages.remove(0);
            }
        }
        if let Some(max_chars) = self.policy.max_chars {
            while self.total_chars() > max_chars && self.messages.len() > 1 {
                self.messages.remove(0);
            }
        }
    }

    fn total_chars(&self) -> usize {
        self.messages.iter().map(Message::char_len).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User { text: String },
    Assistant { parts: Vec<MessagePart> },
    Tool { parts: Vec<MessagePart> },
}

impl Message {
    pub fn role(&self) -> &'static str {
        match self {
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    pub fn parts(&self) -> Option<&[MessagePart]> {
        match self {
            Message::User { .. } => None,
            Message::Assistant { parts } | Message::Tool { parts } => Some(parts),
        }
    }

    pub fn parts_mut(&mut self) -> Option<&mut Vec<MessagePart>> {
        match self {
            Message::User { .. } => None,
            Message::Assistant { parts } | Message::Tool { parts } => Some(parts),
        }
    }

    fn char_len(&self) -> usize {
        match self {
            Message::User { text } => text.len(),
            Message::Assistant { parts } | Message::Tool { parts } => {
                parts.iter().map(MessagePart::char_len).sum()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        params: serde_json::Value,
    },
    ToolResult {
        id: String,
        name: String,
        result: serde_json::Value,
        is_failure: bool,
    },
}

impl MessagePart {
    pub fn tool_call_name(&self) -> Option<&str> {
        match self {
            MessagePart::ToolCall { name, .. } | MessagePart::ToolResult { name, .. } => {
                Some(name)
            }
            MessagePart::Text { .. } => None,
        }
    }

    fn char_len(&self) -> usize {
        match self {
            MessagePart::Text { text } => text.len(),
            MessagePart::ToolCall { params, .. } => params.to_string().len(),
            MessagePart::ToolResult { result, .. } => result.to_string().len(),
        }
    }
}

/// Mints a turn-unique conversation id in the `conv_<unix_ms>_<rand>` shape
/// used by the Turn Coordinator (spec §4.9 step 2). Kept outside
/// `ConversationId` because it needs a clock and RNG, which domain types
/// must not reach for directly.
pub fn mint_conversation_id(now_ms: i64) -> String {
    use rand::Rng;
    let suffix: u32 = rand::rng().random();
    format!("conv_{}_{:08x}", now_ms, suffix)
}

/// Mints a turn-unique tool-call id shared between an Assistant `ToolCall`
/// and its `ToolResult` (spec §4.9 step 7).
pub fn mint_tool_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// Rewrites every `ToolCall`/`ToolResult` id in `messages` to a fresh,
/// turn-unique id (spec §4.9 step 7), preserving the pairing between a
/// call and its result via the ids they already share. Model-assigned ids
/// are only unique within one agent's own step loop; persisted history
/// must be unique across the whole turn (and across a handoff chain).
pub fn remint_tool_call_ids(messages: Vec<Message>) -> Vec<Message> {
    let mut remap: std::collections::HashMap<String, String> = std::collections::HashMap::new();
    messages
        .into_iter()
        .map(|message| match message {
            Message::User { text } => Message::User { text },
            Message::Assistant { parts } => Message::Assistant {
                parts: remint_parts(parts, &mut remap),
            },
            Message::Tool { parts } => Message::Tool {
                parts: remint_parts(parts, &mut remap),
            },
        })
        .collect()
}

fn remint_parts(
    parts: Vec<MessagePart>,
    remap: &mut std::collections::HashMap<String, String>,
) -> Vec<MessagePart> {
    parts
        .into_iter()
        .map(|part| match part {
            MessagePart::Text { text } => MessagePart::Text { text },
            MessagePart::ToolCall { id, name, params } => {
                let fresh = remap.entry(id).or_insert_with(mint_tool_call_id).clone();
                MessagePart::ToolCall {
                    id: fresh,
                    name,
                    params,
                }
            }
            MessagePart::ToolResult {
                id,
                name,
                result,
                is_failure,
            } => {
                let fresh = remap.entry(id).or_insert_with(mint_tool_call_id).clone();
                MessagePart::ToolResult {
                    id: fresh,
                    name,
                    result,
                    is_failure,
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_respects_max_messages() {
        let mut conv = Conversation::new(
            "c1",
            ConversationPolicy {
                max_messages: Some(2),
                max_chars: None,
                strict_lookup: false,
            },
        );
        conv.append(Message::User { text: "a".into() });
        conv.append(Message::User { text: "b".into() });
        conv.append(Message::User { text: "c".into() });
        assert_eq!(conv.messages.len(), 2);
        assert!(matches!(&conv.messages[0], Message::User { text } if text == "b"));
    }

    #[test]
    fn mint_conversation_id_has_expected_shape() {
        let id = mint_conversation_id(1_700_000_000_000);
        assert!(id.starts_with("conv_1700000000000_"));
    }

    #[test]
    fn tool_result_is_preceded_invariant_is_checkable() {
        let mut conv = Conversation::new("c1", ConversationPolicy::default());
        let call_id = mint_tool_call_id();
        conv.append(Message::Assistant {
            parts: vec![MessagePart::ToolCall {
                id: call_id.clone(),
                name: "search".into(),
                params: serde_json::json!({}),
            }],
        });
        conv.append(Message::Tool {
            parts: vec![MessagePart::ToolResult {
                id: call_id.clone(),
                name: "search".into(),
                result: serde_json::json!({"ok": true}),
                is_failure: false,
            }],
        });
        let call_ids: Vec<&str> = conv
            .messages
            .iter()
            .filter_map(Message::parts)
            .flatten()
            .filter_map(|p| match p {
                MessagePart::ToolCall { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        assert!(call_ids.contains(&call_id.as_str()));
    }

    #[test]
    fn remint_preserves_call_result_pairing_under_fresh_ids() {
        let messages = vec![
            Message::Assistant {
                parts: vec![MessagePart::ToolCall {
                    id: "model-call-1".into(),
                    name: "search".into(),
                    params: serde_json::json!({}),
                }],
            },
            Message::Tool {
                parts: vec![MessagePart::ToolResult {
                    id: "model-call-1".into(),
                    name: "search".into(),
                    result: serde_json::json!({"ok": true}),
                    is_failure: false,
                }],
            },
        ];
        let reminted = remint_tool_call_ids(messages);
        let call_id = match &reminted[0] {
            Message::Assistant { parts } => match &parts[0] {
                MessagePart::ToolCall { id, .. } => id.clone(),
                _ => panic!("expected tool call"),
            },
            _ => panic!("expected assistant message"),
        };
        let result_id = match &reminted[1] {
            Message::Tool { parts } => match &parts[0] {
                MessagePart::ToolResult { id, .. } => id.clone(),
                _ => panic!("expected tool result"),
            },
            _ => panic!("expected tool message"),
        };
        assert_eq!(call_id, result_id);
        assert_ne!(call_id, "model-call-1");
    }
}
