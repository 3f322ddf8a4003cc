// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stream Event Pipeline (C6): the single ordered event channel for one
//! turn, including across handoff hops (spec §4.6).

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::events::{
    EventError, HandoffKind, HandoffResult, RunStartInput, SequenceCounter, StreamEvent,
    StreamEventKind, ToolCallOutcome, TurnResult, Usage,
};

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("event receiver closed")]
    Closed,
}

/// One producer per turn (spec §5): owns the turn's `SequenceCounter` and
/// writes into a bounded channel. Cloned across a handoff hop so
/// numbering stays monotonic across the whole chain.
#[derive(Clone)]
pub struct StreamSink {
    sender: mpsc::Sender<StreamEvent>,
    sequence: std::sync::Arc<tokio::sync::Mutex<SequenceCounter>>,
    run_id: String,
    thread_id: Option<String>,
}

impl StreamSink {
    pub fn new(run_id: String, thread_id: Option<String>, capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                sender,
                sequence: std::sync::Arc::new(tokio::sync::Mutex::new(SequenceCounter::default())),
                run_id,
                thread_id,
            },
            receiver,
        )
    }

    async fn emit(&self, kind: StreamEventKind) -> Result<(), EmitError> {
        let sequence = self.sequence.lock().await.next();
        let event = StreamEvent {
            sequence,
            emitted_at_ms: Utc::now().timestamp_millis(),
            run_id: self.run_id.clone(),
            thread_id: self.thread_id.clone(),
            kind,
        };
        self.sender.send(event).await.map_err(|_| EmitError::Closed)
    }

    pub async fn run_start(&self, message: String, previous_messages: Vec<crate::domain::message::Message>) -> Result<(), EmitError> {
        self.emit(StreamEventKind::RunStart {
            input: RunStartInput {
                message,
                previous_messages,
            },
            started_at_ms: Utc::now().timestamp_millis(),
        })
        .await
    }

    pub async fn message_start(&self, message_id: String) -> Result<(), EmitError> {
        self.emit(StreamEventKind::MessageStart {
            message_id,
            step: 0,
            role: "assistant".to_string(),
        })
        .await
    }

    pub async fn step_start(&self, step_index: u32) -> Result<(), EmitError> {
        self.emit(StreamEventKind::StepStart { step_index }).await
    }

    pub async fn token(&self, step_index: u32, delta: String, accumulated: String) -> Result<(), EmitError> {
        self.emit(StreamEventKind::Token {
            step_index,
            delta,
            accumulated,
        })
        .await
    }

    pub async fn tool_call(
        &self,
        step_index: u32,
        tool_call_id: String,
        tool_name: String,
        input: serde_json::Value,
    ) -> Result<(), EmitError> {
        self.emit(StreamEventKind::ToolCall {
            step_index,
            tool_call_id,
            tool_name,
            input,
        })
        .await
    }

    pub async fn tool_result(
        &self,
        step_index: u32,
        tool_call_id: String,
        tool_name: String,
        output: serde_json::Value,
    ) -> Result<(), EmitError> {
        self.emit(StreamEventKind::ToolResult {
            step_index,
            tool_call_id,
            tool_name,
            output,
            metadata: None,
        })
        .await
    }

    pub async fn tool_error(
        &self,
        step_index: u32,
        tool_call_id: String,
        tool_name: String,
        message: String,
    ) -> Result<(), EmitError> {
        self.emit(StreamEventKind::ToolError {
            step_index,
            tool_call_id,
            tool_name,
            error: EventError {
                message,
                name: None,
                stack: None,
            },
        })
        .await
    }

    pub async fn step_complete(&self, step_index: u32) -> Result<(), EmitError> {
        self.emit(StreamEventKind::StepComplete { step_index }).await
    }

    pub async fn approval_required(
        &self,
        step_index: u32,
        tool_call_id: String,
        tool_name: String,
        prompt: String,
        ttl_ms: u64,
    ) -> Result<(), EmitError> {
        self.emit(StreamEventKind::ApprovalRequired {
            step_index,
            tool_call_id,
            tool_name,
            prompt,
            ttl_ms,
        })
        .await
    }

    pub async fn usage(&self, usage: Usage) -> Result<(), EmitError> {
        self.emit(StreamEventKind::Usage { usage }).await
    }

    pub async fn handoff_start(
        &self,
        from_agent_id: String,
        to_agent_id: String,
        message: String,
        context: Option<String>,
        handoff_depth: u32,
    ) -> Result<(), EmitError> {
        self.emit(StreamEventKind::HandoffStart {
            from_agent_id,
            to_agent_id,
            message,
            context,
            handoff_depth,
        })
        .await
    }

    pub async fn run_end(&self, started_at_ms: i64, content: String, tool_calls: Vec<ToolCallOutcome>, usage: Option<Usage>, handoff: Option<(String, String, Option<String>)>) -> Result<(), EmitError> {
        let finished_at_ms = Utc::now().timestamp_millis();
        let handoff = handoff.map(|(agent_id, message, context)| HandoffResult {
            kind: HandoffKind::Handoff,
            agent_id,
            message,
            context,
        });
        self.emit(StreamEventKind::RunEnd {
            finished_at_ms,
            duration_ms: finished_at_ms - started_at_ms,
            result: TurnResult {
                content,
                tool_calls,
                usage,
                handoff,
            },
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequence_numbers_are_monotonic_across_calls() {
        let (sink, mut rx) = StreamSink::new("run-1".into(), None, 16);
        sink.run_start("hi".into(), vec![]).await.unwrap();
        sink.step_start(0).await.unwrap();
        sink.step_complete(0).await.unwrap();
        sink.run_end(0, "done".into(), vec![], None, None).await.unwrap();

        let mut prev = None;
        for _ in 0..4 {
            let event = rx.recv().await.unwrap();
            if let Some(p) = prev {
                assert_eq!(event.sequence, p + 1);
            }
            prev = Some(event.sequence);
        }
    }

    #[tokio::test]
    async fn run_start_is_first_and_run_end_is_last() {
        let (sink, mut rx) = StreamSink::new("run-1".into(), None, 16);
        sink.run_start("hi".into(), vec![]).await.unwrap();
        sink.step_start(0).await.unwrap();
        sink.run_end(0, "done".into(), vec![], None, None).await.unwrap();
        drop(sink);

        let first = rx.recv().await.unwrap();
        assert!(first.is_run_start());
        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        assert!(last.unwrap().is_run_end());
    }
}
