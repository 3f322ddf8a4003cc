// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! # agentflow-core
//!
//! Orchestration engine for multi-agent LLM applications: a typed Router,
//! an Agent Step Loop that interleaves model turns with tool calls under
//! retry/timeout/approval policies, a Tool Gate, a Handoff Controller that
//! chains agents with bounded depth, a Stream Event Pipeline, and an MCP
//! Client Registry for external tool servers.
//!
//! ## Layer structure
//!
//! ```text
//! engine          <- composition root (Engine::new)
//!     v
//! application/    <- C1-C9 orchestration services
//!     v
//! domain/         <- aggregates, value objects, consumed-port traits
//!     v
//! infrastructure/ <- reference adapters for the consumed ports
//! ```
//!
//! Persistent storage, model-provider HTTP clients, config-file parsing,
//! semantic-similarity matching, OpenTelemetry export, and redaction
//! policy are external collaborators this crate only depends on through
//! narrow traits in `domain` (see `domain::repository`, `domain::model`,
//! `domain::matching`); `infrastructure` ships deterministic reference
//! implementations of each for standalone use.

pub mod application;
pub mod domain;
pub mod engine;
pub mod infrastructure;

pub use engine::Engine;
