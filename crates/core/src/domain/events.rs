// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stream event shapes and ordering invariants for the Stream Event
//! Pipeline (spec §4.6, §6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::Message;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallOutcome {
    pub tool_id: String,
    pub args: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolCallErrorCode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallErrorCode {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffResult {
    #[serde(rename = "type")]
    pub kind: HandoffKind,
    pub agent_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffKind {
    Handoff,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handoff: Option<HandoffResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStartInput {
    pub message: String,
    pub previous_messages: Vec<Message>,
}

/// A single entry in the totally ordered per-turn event stream (spec
/// §4.6). Every variant shares `sequence`, `emitted_at_ms`, `run_id`, and
/// optional `thread_id` via the wrapper `StreamEvent` below rather than
/// duplicating them per-variant, since serde's adjacently/internally
/// tagged representations don't support "flatten these shared fields into
/// every variant" directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEventKind {
    RunStart {
        input: RunStartInput,
        started_at_ms: i64,
    },
    MessageStart {
        message_id: String,
        step: u32,
        role: String,
    },
    StepStart {
        step_index: u32,
    },
    Token {
        step_index: u32,
        delta: String,
        accumulated: String,
    },
    ToolCall {
        step_index: u32,
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    ToolResult {
        step_index: u32,
        tool_call_id: String,
        tool_name: String,
        output: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },
    ToolError {
        step_index: u32,
        tool_call_id: String,
        tool_name: String,
        error: EventError,
    },
    StepComplete {
        step_index: u32,
    },
    /// The loop-side equivalent of C4's Pause signal (spec §4.5.5): not
    /// part of the original field sketch, but the spec requires "an
    /// equivalent event on the stream" and the closest existing kinds
    /// (`tool-error`) would misreport a pause as a failure.
    ApprovalRequired {
        step_index: u32,
        tool_call_id: String,
        tool_name: String,
        prompt: String,
        ttl_ms: u64,
    },
    Usage {
        usage: Usage,
    },
    HandoffStart {
        from_agent_id: String,
        to_agent_id: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<String>,
        handoff_depth: u32,
    },
    RunEnd {
        finished_at_ms: i64,
        duration_ms: i64,
        result: TurnResult,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub sequence: u64,
    pub emitted_at_ms: i64,
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(flatten)]
    pub kind: StreamEventKind,
}

impl StreamEvent {
    pub fn is_run_start(&self) -> bool {
        matches!(self.kind, StreamEventKind::RunStart { .. })
    }

    pub fn is_run_end(&self) -> bool {
        matches!(self.kind, StreamEventKind::RunEnd { .. })
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        match &self.kind {
            StreamEventKind::ToolCall { tool_call_id, .. }
            | StreamEventKind::ToolResult { tool_call_id, .. }
            | StreamEventKind::ToolError { tool_call_id, .. }
            | StreamEventKind::ApprovalRequired { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }

    pub fn step_index(&self) -> Option<u32> {
        match &self.kind {
            StreamEventKind::StepStart { step_index }
            | StreamEventKind::Token { step_index, .. }
            | StreamEventKind::ToolCall { step_index, .. }
            | StreamEventKind::ToolResult { step_index, .. }
            | StreamEventKind::ToolError { step_index, .. }
            | StreamEventKind::ApprovalRequired { step_index, .. }
            | StreamEventKind::StepComplete { step_index } => Some(*step_index),
            _ => None,
        }
    }
}

/// Monotonic sequence-number generator, one instance per turn, shared
/// across the initiating agent and every handoff target so numbering
/// survives a handoff hop (spec §4.6 invariant 6).
#[derive(Debug, Default)]
pub struct SequenceCounter(u64);

impl SequenceCounter {
    pub fn next(&mut self) -> u64 {
        let seq = self.0;
        self.0 += 1;
        seq
    }
}
