// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! `Tracer` port and its `tracing`-backed implementation (spec §6). OTLP
//! export wiring is an out-of-scope external collaborator; this crate only
//! needs spans to carry the attributes spec §4.4 names
//! (`tool.id`, `tool.timeout`, `retry.*`, `handoff.depth`, ...) so a host
//! can wire its own exporter onto the `tracing` subscriber it installs.

use std::collections::HashMap;

use tracing::{span, Level, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Internal,
    Client,
    Server,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// The engine's span handle: a thin wrapper so call sites never depend on
/// `tracing::Span` directly, keeping the door open to a non-`tracing`
/// `Tracer` implementation. `tracing`'s field set is fixed at the
/// `span!`/`event!` call site, so per-key attributes are logged as
/// structured events on the span rather than as dynamic span fields.
pub struct EngineSpan {
    inner: Span,
}

impl EngineSpan {
    pub fn set_attribute(&self, key: &str, value: impl Into<AttributeValue>) {
        let _guard = self.inner.enter();
        match value.into() {
            AttributeValue::String(v) => tracing::event!(Level::DEBUG, attribute = key, value = %v),
            AttributeValue::Int(v) => tracing::event!(Level::DEBUG, attribute = key, value = v),
            AttributeValue::Bool(v) => tracing::event!(Level::DEBUG, attribute = key, value = v),
        };
    }

    pub fn set_attributes(&self, attributes: &HashMap<String, AttributeValue>) {
        for (key, value) in attributes {
            self.set_attribute(key, value.clone());
        }
    }

    pub fn add_event(&self, name: &str) {
        self.inner.in_scope(|| tracing::event!(Level::INFO, event = name));
    }

    pub fn record_exception(&self, error: &str) {
        self.inner.in_scope(|| tracing::event!(Level::ERROR, exception = error));
    }

    pub fn end(self) {
        drop(self.inner);
    }
}

/// `(name, {kind, attributes}) -> Span` (spec §6). Optional: the engine
/// runs with plain `tracing` spans when no `Tracer` is supplied, since
/// `tracing`'s own subscriber machinery already provides that.
pub trait Tracer: Send + Sync {
    fn start_span(&self, name: &str, kind: SpanKind, attributes: &HashMap<String, AttributeValue>) -> EngineSpan;
}

#[derive(Default)]
pub struct TracingTracer;

impl Tracer for TracingTracer {
    fn start_span(&self, name: &str, kind: SpanKind, attributes: &HashMap<String, AttributeValue>) -> EngineSpan {
        let otel_kind = match kind {
            SpanKind::Internal => "internal",
            SpanKind::Client => "client",
            SpanKind::Server => "server",
        };
        let span = span!(Level::INFO, "engine_span", name = name, otel.kind = otel_kind);
        let handle = EngineSpan { inner: span };
        handle.set_attributes(attributes);
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_span_accepts_mixed_attribute_types() {
        let tracer = TracingTracer;
        let mut attrs = HashMap::new();
        attrs.insert("tool.id".to_string(), AttributeValue::from("search"));
        attrs.insert("retry.attempt".to_string(), AttributeValue::from(2i64));
        let span = tracer.start_span("tool.invoke", SpanKind::Internal, &attrs);
        span.add_event("started");
        span.end();
    }
}
