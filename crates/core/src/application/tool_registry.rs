// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tool Registry (C1): the mapping from tool id to `ToolDefinition` plus
//! the invoker functions that run them (spec §4.1).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::domain::tool::ToolDefinition;

pub type InvokerResult = Result<Value, String>;
pub type InvokerFuture = Pin<Box<dyn Future<Output = InvokerResult> + Send>>;
pub type ToolInvokerFn = Arc<dyn Fn(Value) -> InvokerFuture + Send + Sync>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ToolRegistryError {
    #[error("tool '{0}' is already registered")]
    AlreadyExists(String),
    #[error("strict tool '{0}' requires an input schema")]
    StrictToolMissingSchema(String),
}

struct Entry {
    definition: ToolDefinition,
    invoker: ToolInvokerFn,
}

/// Reader-heavy concurrent map (spec §5 shared-resource policy): writes
/// (register/remove/clear) are infrequent, so a `DashMap` sharded lock is
/// enough and avoids a single global `RwLock` bottleneck on lookup.
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Entry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        definition: ToolDefinition,
        invoker: ToolInvokerFn,
    ) -> Result<(), ToolRegistryError> {
        definition
            .validate()
            .map_err(|_| ToolRegistryError::StrictToolMissingSchema(definition.id.clone()))?;
        if self.tools.contains_key(&definition.id) {
            return Err(ToolRegistryError::AlreadyExists(definition.id.clone()));
        }
        let id = definition.id.clone();
        let capabilities = definition.capabilities();
        self.tools.insert(id.clone(), Entry { definition, invoker });
        debug!(tool.id = %id, ?capabilities, "tool registered");
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Option<ToolDefinition> {
        self.tools.get(id).map(|e| e.definition.clone())
    }

    pub fn invoker(&self, id: &str) -> Option<ToolInvokerFn> {
        self.tools.get(id).map(|e| e.invoker.clone())
    }

    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|e| e.definition.clone()).collect()
    }

    /// Definitions for ids that are missing from the registry, in the
    /// order given.
    pub fn list_missing(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .filter(|id| !self.tools.contains_key(*id))
            .cloned()
            .collect()
    }

    pub fn remove(&self, id: &str) -> Option<ToolDefinition> {
        let removed = self.tools.remove(id).map(|(_, e)| e.definition);
        if removed.is_some() {
            debug!(tool.id = %id, "tool removed");
        }
        removed
    }

    pub fn clear(&self) {
        self.tools.clear();
        debug!("tool registry cleared");
    }

    /// Returns definitions in the given order, skipping unknown ids
    /// (spec §4.1 `normalize`).
    pub fn normalize(&self, ids: &[String]) -> Vec<ToolDefinition> {
        ids.iter().filter_map(|id| self.lookup(id)).collect()
    }

    /// Definitions whose `name` is in `names`, preserving registry
    /// iteration order (spec §4.1 `filterByNames`).
    pub fn filter_by_names(&self, names: &[String]) -> Vec<ToolDefinition> {
        let wanted: std::collections::HashSet<&str> = names.iter().map(String::as_str).collect();
        self.tools
            .iter()
            .filter(|e| wanted.contains(e.definition.name.as_str()))
            .map(|e| e.definition.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Convenience constructor for tests and the reference CLI: wraps a plain
/// async closure as a `ToolInvokerFn`.
pub fn invoker_fn<F, Fut>(f: F) -> ToolInvokerFn
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = InvokerResult> + Send + 'static,
{
    Arc::new(move |input| Box::pin(f(input)))
}
