// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Reference implementations of the consumed ports declared in `domain`
//! (spec §6): conversation storage, a model provider, a semantic matcher,
//! a tracer, and a redaction filter. A host application supplies its own
//! production-grade adapters; these exist so the engine is runnable and
//! testable standalone.

pub mod config;
pub mod conversation_store;
pub mod model_provider;
pub mod redaction;
pub mod semantic_matcher;
pub mod tracer;

pub use config::{EngineConfig, LogFormat};
pub use conversation_store::InMemoryConversationStore;
pub use model_provider::{EchoModelProvider, ScriptedModelProvider};
pub use redaction::{LogLevel, PassthroughRedactor, PayloadType, RedactionContext, RedactionFilter};
pub use semantic_matcher::TokenOverlapMatcher;
pub use tracer::{AttributeValue, EngineSpan, SpanKind, Tracer, TracingTracer};
