// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! MCP Client Registry (C2): lifecycle, health, and tool discovery of
//! external tool servers (spec §4.2).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::mcp::{MCPServerConfig, MCPServerEntry, MCPServerStatus};
use crate::domain::schema::Schema;
use crate::domain::tool::ToolDefinition;

#[derive(Debug, Clone)]
pub struct McpToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Option<Schema>,
}

/// The consumed interface to one running MCP server connection. An
/// infrastructure adapter implements this against a real transport
/// (stdio/http/sse); the registry only ever talks to the trait.
#[async_trait]
pub trait McpClient: Send + Sync {
    async fn initialize(&self) -> Result<(), String>;
    async fn list_tools(&self) -> Result<Vec<McpToolSpec>, String>;
    async fn call_tool(&self, name: &str, args: Value) -> Result<Value, String>;
    async fn check_health(&self) -> Result<bool, String>;
    async fn close(&self) -> Result<(), String>;
}

pub type McpClientFactory = Arc<dyn Fn(&MCPServerConfig) -> Arc<dyn McpClient> + Send + Sync>;

#[derive(Debug, Error)]
pub enum McpRegistryError {
    #[error("MCP server '{0}' is not registered")]
    UnknownServer(String),
    #[error("MCP server '{0}' is not connected")]
    NotConnected(String),
    #[error("tool call against '{0}' failed: {1}")]
    ToolCallFailed(String, String),
}

struct ServerSlot {
    entry: Mutex<MCPServerEntry>,
    client: Mutex<Option<Arc<dyn McpClient>>>,
    /// Guards at-most-one in-flight `initialize`/reconnect per server id
    /// under a storm of concurrent `ensure_connected` calls (spec §5,
    /// §8 property).
    init_lock: Mutex<()>,
    health_cancel: Mutex<Option<CancellationToken>>,
}

/// Owns server lifecycle state and live client handles (spec §3
/// ownership rule: the MCP registry exclusively owns connections and
/// proxy `ToolDefinition`s namespaced `"<serverId>/<toolName>"`).
pub struct McpClientRegistry {
    servers: DashMap<String, Arc<ServerSlot>>,
    factory: McpClientFactory,
    metrics_enabled: bool,
}

impl McpClientRegistry {
    pub fn new(factory: McpClientFactory) -> Self {
        Self::with_metrics(factory, false)
    }

    /// Same as `new`, but wires `mcp_reconnect_attempts_total` and
    /// `mcp_server_status` into the `metrics` facade when `metrics_enabled`
    /// is set (spec §4.2.1).
    pub fn with_metrics(factory: McpClientFactory, metrics_enabled: bool) -> Self {
        Self {
            servers: DashMap::new(),
            factory,
            metrics_enabled,
        }
    }

    fn slot(&self, id: &str) -> Option<Arc<ServerSlot>> {
        self.servers.get(id).map(|s| s.clone())
    }

    /// `mcp_server_status` gauge: one numeric reading per server id,
    /// following the teacher's `ToolServerManager::health_check_loop`
    /// gauge-per-tick convention.
    fn record_status_gauge(&self, id: &str, status: MCPServerStatus) {
        if !self.metrics_enabled {
            return;
        }
        let value = match status {
            MCPServerStatus::Unregistered => 0.0,
            MCPServerStatus::Connecting => 1.0,
            MCPServerStatus::Connected => 2.0,
            MCPServerStatus::Disconnected => 3.0,
            MCPServerStatus::Error => 4.0,
        };
        metrics::gauge!("mcp_server_status", "server_id" => id.to_string()).set(value);
    }

    /// Register-and-connect (spec §4.2): on failure, log and leave the
    /// entry unregistered-equivalent (status `error`) — never propagate.
    pub async fn register_and_connect(&self, config: MCPServerConfig) {
        let id = config.id.clone();
        let lazy = config.lazy;
        let slot = Arc::new(ServerSlot {
            entry: Mutex::new(MCPServerEntry::new(config)),
            client: Mutex::new(None),
            init_lock: Mutex::new(()),
            health_cancel: Mutex::new(None),
        });
        self.servers.insert(id.clone(), slot.clone());
        if lazy {
            return;
        }
        if let Err(e) = self.ensure_connected(&id).await {
            warn!(server.id = %id, error = %e, "MCP server failed to connect at registration");
        }
    }

    /// Register-lazy (spec §4.2): store config without connecting.
    pub fn register_lazy(&self, mut config: MCPServerConfig) {
        config.lazy = true;
        let id = config.id.clone();
        let slot = Arc::new(ServerSlot {
            entry: Mutex::new(MCPServerEntry::new(config)),
            client: Mutex::new(None),
            init_lock: Mutex::new(()),
            health_cancel: Mutex::new(None),
        });
        self.servers.insert(id, slot);
    }

    /// Idempotent and safe under concurrent callers: the `init_lock`
    /// ensures at most one `initialize` is in flight per server id, even
    /// when many tasks call this simultaneously (spec §8 property).
    pub async fn ensure_connected(&self, id: &str) -> Result<(), McpRegistryError> {
        let slot = self
            .slot(id)
            .ok_or_else(|| McpRegistryError::UnknownServer(id.to_string()))?;

        {
            let entry = slot.entry.lock().await;
            if entry.status == MCPServerStatus::Connected {
                return Ok(());
            }
        }

        let _guard = slot.init_lock.lock().await;
        {
            let entry = slot.entry.lock().await;
            if entry.status == MCPServerStatus::Connected {
                return Ok(());
            }
        }

        let config = slot.entry.lock().await.config.clone();
        let client = (self.factory)(&config);
        match client.initialize().await {
            Ok(()) => {
                *slot.client.lock().await = Some(client);
                slot.entry.lock().await.mark_connected();
                self.record_status_gauge(id, MCPServerStatus::Connected);
                Ok(())
            }
            Err(e) => {
                slot.entry.lock().await.mark_error();
                self.record_status_gauge(id, MCPServerStatus::Error);
                warn!(server.id = %id, error = %e, "MCP server initialize failed");
                Err(McpRegistryError::NotConnected(id.to_string()))
            }
        }
    }

    pub async fn status(&self, id: &str) -> Option<MCPServerStatus> {
        let slot = self.slot(id)?;
        Some(slot.entry.lock().await.status)
    }

    /// Discover tools for one connected server (spec §4.2 discover).
    pub async fn discover_tools(&self, id: &str) -> Result<Vec<ToolDefinition>, McpRegistryError> {
        let slot = self
            .slot(id)
            .ok_or_else(|| McpRegistryError::UnknownServer(id.to_string()))?;
        let connected = slot.entry.lock().await.can_serve_tools();
        if !connected {
            return Err(McpRegistryError::NotConnected(id.to_string()));
        }
        let client = slot
            .client
            .lock()
            .await
            .clone()
            .ok_or_else(|| McpRegistryError::NotConnected(id.to_string()))?;
        let specs = client
            .list_tools()
            .await
            .map_err(|e| McpRegistryError::ToolCallFailed(id.to_string(), e))?;

        let namespaced_id = slot.entry.lock().await.namespaced_tool_id("");
        let prefix = namespaced_id.trim_end_matches('/');
        Ok(specs
            .into_iter()
            .map(|spec| ToolDefinition {
                id: format!("{prefix}/{}", spec.name),
                name: format!("{prefix}/{}", spec.name),
                description: spec.description,
                input_schema: spec.input_schema,
                success_schema: None,
                failure_schema: None,
                manual_capabilities: vec![],
                strict: false,
            })
            .collect())
    }

    /// Discover-all (spec §4.2): never aborts the whole scan on one bad
    /// server; skips disconnected servers with a warning.
    pub async fn discover_all(&self) -> HashMap<String, Vec<ToolDefinition>> {
        let ids: Vec<String> = self.servers.iter().map(|e| e.key().clone()).collect();
        let mut out = HashMap::new();
        for id in ids {
            match self.discover_tools(&id).await {
                Ok(tools) => {
                    out.insert(id, tools);
                }
                Err(e) => warn!(server.id = %id, error = %e, "skipping server during discover-all"),
            }
        }
        out
    }

    pub async fn call_tool(&self, id: &str, tool_name: &str, args: Value) -> Result<Value, McpRegistryError> {
        let slot = self
            .slot(id)
            .ok_or_else(|| McpRegistryError::UnknownServer(id.to_string()))?;
        if !slot.entry.lock().await.can_serve_tools() {
            return Err(McpRegistryError::NotConnected(id.to_string()));
        }
        let client = slot
            .client
            .lock()
            .await
            .clone()
            .ok_or_else(|| McpRegistryError::NotConnected(id.to_string()))?;
        client
            .call_tool(tool_name, args)
            .await
            .map_err(|e| McpRegistryError::ToolCallFailed(id.to_string(), e))
    }

    /// Reconnect with bounded retries and power-of-two backoff (spec
    /// §4.2): on success, status becomes `connected` and tools are
    /// re-discovered (a re-discovery failure is logged, not fatal); on
    /// exhaustion, status becomes `error`.
    pub async fn reconnect(&self, id: &str) -> Result<(), McpRegistryError> {
        let slot = self
            .slot(id)
            .ok_or_else(|| McpRegistryError::UnknownServer(id.to_string()))?;
        let _guard = slot.init_lock.lock().await;

        let (config, max_retries) = {
            let entry = slot.entry.lock().await;
            (entry.config.clone(), entry.config.reconnect_policy.max_retries)
        };
        slot.entry.lock().await.begin_reconnect().ok();

        for attempt in 0..max_retries {
            let total_attempts = slot.entry.lock().await.record_reconnect_attempt();
            if self.metrics_enabled {
                metrics::counter!("mcp_reconnect_attempts_total", "server_id" => id.to_string())
                    .increment(1);
            }
            tracing::debug!(server.id = %id, attempt, total_attempts, "reconnect attempt");

            let client = (self.factory)(&config);
            if client.initialize().await.is_ok() {
                *slot.client.lock().await = Some(client);
                slot.entry.lock().await.mark_connected();
                self.record_status_gauge(id, MCPServerStatus::Connected);
                drop(self.discover_tools(id).await);
                return Ok(());
            }
            let backoff = config.reconnect_policy.backoff_for_attempt(attempt);
            tokio::time::sleep(backoff).await;
        }

        slot.entry.lock().await.mark_error();
        self.record_status_gauge(id, MCPServerStatus::Error);
        Err(McpRegistryError::NotConnected(id.to_string()))
    }

    /// One cooperative timer per server at the configured interval (spec
    /// §4.2 health loop). Each tick checks connectivity and triggers
    /// `reconnect` on a disconnected result.
    pub async fn spawn_health_loop(self: &Arc<Self>, id: String) -> Option<CancellationToken> {
        let slot = self.slot(&id)?;
        let interval = {
            let entry = slot.entry.lock().await;
            entry.config.health_check_interval?
        };
        let cancel = CancellationToken::new();
        *slot.health_cancel.lock().await = Some(cancel.clone());
        let registry = Arc::clone(self);
        let loop_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let healthy = {
                            let client = slot.client.lock().await.clone();
                            match client {
                                Some(c) => c.check_health().await.unwrap_or(false),
                                None => false,
                            }
                        };
                        if !healthy {
                            slot.entry.lock().await.mark_disconnected();
                            registry.record_status_gauge(&id, MCPServerStatus::Disconnected);
                            if registry.reconnect(&id).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        });
        Some(cancel)
    }

    /// Shutdown (spec §4.2): stop all health loops first, then close all
    /// clients in registration order, swallowing per-client close errors.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.servers.iter().map(|e| e.key().clone()).collect();
        for id in &ids {
            if let Some(slot) = self.slot(id) {
                if let Some(cancel) = slot.health_cancel.lock().await.take() {
                    cancel.cancel();
                }
            }
        }
        for id in &ids {
            if let Some(slot) = self.slot(id) {
                if let Some(client) = slot.client.lock().await.take() {
                    if let Err(e) = client.close().await {
                        warn!(server.id = %id, error = %e, "error closing MCP client");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyClient {
        fail_times: u32,
        attempts: Arc<AtomicU32>,
    }

    #[async_trait]
    impl McpClient for FlakyClient {
        async fn initialize(&self) -> Result<(), String> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err("connection refused".into())
            } else {
                Ok(())
            }
        }
        async fn list_tools(&self) -> Result<Vec<McpToolSpec>, String> {
            Ok(vec![McpToolSpec {
                name: "search".into(),
                description: "".into(),
                input_schema: None,
            }])
        }
        async fn call_tool(&self, _name: &str, _args: Value) -> Result<Value, String> {
            Ok(Value::Null)
        }
        async fn check_health(&self) -> Result<bool, String> {
            Ok(true)
        }
        async fn close(&self) -> Result<(), String> {
            Ok(())
        }
    }

    fn config(id: &str, lazy: bool) -> MCPServerConfig {
        MCPServerConfig {
            id: id.into(),
            transport: crate::domain::mcp::Transport::Stdio,
            connection: crate::domain::mcp::ConnectionParams::Stdio {
                command: "x".into(),
                args: vec![],
            },
            health_check_interval: None,
            reconnect_policy: Default::default(),
            lazy,
        }
    }

    #[tokio::test]
    async fn register_and_connect_failure_is_isolated_not_thrown() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_for_factory = attempts.clone();
        let factory: McpClientFactory = Arc::new(move |_| {
            Arc::new(FlakyClient {
                fail_times: u32::MAX,
                attempts: attempts_for_factory.clone(),
            })
        });
        let registry = McpClientRegistry::new(factory);
        registry.register_and_connect(config("bad", false)).await;
        assert_eq!(registry.status("bad").await, Some(MCPServerStatus::Error));
    }

    #[tokio::test]
    async fn concurrent_ensure_connected_initializes_exactly_once() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_for_factory = attempts.clone();
        let factory: McpClientFactory = Arc::new(move |_| {
            Arc::new(FlakyClient {
                fail_times: 0,
                attempts: attempts_for_factory.clone(),
            })
        });
        let registry = Arc::new(McpClientRegistry::new(factory));
        registry.register_lazy(config("lazy", true));

        let mut handles = vec![];
        for _ in 0..20 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.ensure_connected("lazy").await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reconnect_succeeds_on_third_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_for_factory = attempts.clone();
        let factory: McpClientFactory = Arc::new(move |_| {
            Arc::new(FlakyClient {
                fail_times: 2,
                attempts: attempts_for_factory.clone(),
            })
        });
        let registry = McpClientRegistry::new(factory);
        registry.register_lazy(config("srv", true));
        registry.ensure_connected("srv").await.ok();
        let result = registry.reconnect("srv").await;
        assert!(result.is_ok());
        assert_eq!(registry.status("srv").await, Some(MCPServerStatus::Connected));
    }

    #[tokio::test]
    async fn reconnect_with_metrics_enabled_still_succeeds() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_for_factory = attempts.clone();
        let factory: McpClientFactory = Arc::new(move |_| {
            Arc::new(FlakyClient {
                fail_times: 1,
                attempts: attempts_for_factory.clone(),
            })
        });
        let registry = McpClientRegistry::with_metrics(factory, true);
        registry.register_lazy(config("metered", true));
        registry.ensure_connected("metered").await.ok();
        let result = registry.reconnect("metered").await;
        assert!(result.is_ok());
        assert_eq!(registry.status("metered").await, Some(MCPServerStatus::Connected));
    }

    #[tokio::test]
    async fn discovered_tools_are_namespaced() {
        let attempts = Arc::new(AtomicU32::new(0));
        let factory: McpClientFactory = Arc::new(move |_| {
            Arc::new(FlakyClient {
                fail_times: 0,
                attempts: attempts.clone(),
            })
        });
        let registry = McpClientRegistry::new(factory);
        registry.register_and_connect(config("docs", false)).await;
        let tools = registry.discover_tools("docs").await.unwrap();
        assert_eq!(tools[0].id, "docs/search");
    }
}
