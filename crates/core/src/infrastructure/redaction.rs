// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! `RedactionFilter` port and a no-op reference implementation (spec §6).
//! Real redaction policy (PII scrubbing, secret masking) is an out-of-scope
//! external collaborator; a host wires its own filter into the engine
//! wherever logged/streamed payloads need scrubbing before they leave the
//! process.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    ToolInput,
    ToolOutput,
    ModelPrompt,
    ModelResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct RedactionContext {
    pub payload_type: PayloadType,
    pub source: String,
    pub log_level: LogLevel,
}

/// `(payload, {payloadType, source, logLevel}) -> payload` (spec §6).
pub trait RedactionFilter: Send + Sync {
    fn redact(&self, payload: Value, context: &RedactionContext) -> Value;
}

/// Returns the payload unchanged. The default when no host filter is
/// configured.
#[derive(Default)]
pub struct PassthroughRedactor;

impl RedactionFilter for PassthroughRedactor {
    fn redact(&self, payload: Value, _context: &RedactionContext) -> Value {
        payload
    }
}
