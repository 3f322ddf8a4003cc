// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! MCP server configuration and lifecycle status (spec §3, §4.2).

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Stdio,
    Http,
    Sse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionParams {
    Stdio { command: String, args: Vec<String> },
    Http { url: String },
    Sse { url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

impl ReconnectPolicy {
    /// `1s, 2s, 4s, ...` power-of-two backoff bounded by attempt `N-1`
    /// (spec §4.2, §5).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_secs(1u64 << attempt.min(self.max_retries.saturating_sub(1)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPServerConfig {
    pub id: String,
    pub transport: Transport,
    pub connection: ConnectionParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_interval: Option<Duration>,
    #[serde(default)]
    pub reconnect_policy: ReconnectPolicy,
    #[serde(default)]
    pub lazy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MCPServerStatus {
    Unregistered,
    Connecting,
    Connected,
    Disconnected,
    Error,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MCPStateError {
    #[error("invalid MCP server state transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: MCPServerStatus,
        to: MCPServerStatus,
    },
}

/// Runtime record the MCP Client Registry keeps per server id. The live
/// client handle itself is not modeled here: it is an infrastructure
/// concern (an opaque `Box<dyn McpClient>` held alongside this record),
/// which is why this type carries only state, not behavior that needs I/O.
#[derive(Debug, Clone)]
pub struct MCPServerEntry {
    pub config: MCPServerConfig,
    pub status: MCPServerStatus,
    pub reconnect_attempts: u32,
}

impl MCPServerEntry {
    pub fn new(config: MCPServerConfig) -> Self {
        let status = if config.lazy {
            MCPServerStatus::Unregistered
        } else {
            MCPServerStatus::Connecting
        };
        Self {
            config,
            status,
            reconnect_attempts: 0,
        }
    }

    pub fn mark_connected(&mut self) {
        self.status = MCPServerStatus::Connected;
        self.reconnect_attempts = 0;
    }

    pub fn mark_disconnected(&mut self) {
        if self.status == MCPServerStatus::Connected {
            self.status = MCPServerStatus::Disconnected;
        }
    }

    pub fn begin_reconnect(&mut self) -> Result<(), MCPStateError> {
        if self.status == MCPServerStatus::Connected {
            return Err(MCPStateError::InvalidTransition {
                from: self.status,
                to: MCPServerStatus::Connecting,
            });
        }
        self.status = MCPServerStatus::Connecting;
        Ok(())
    }

    pub fn mark_error(&mut self) {
        self.status = MCPServerStatus::Error;
    }

    /// Counts one reconnect attempt (spec §4.2.1 metric source) and
    /// returns the running total. Reset to 0 by `mark_connected`.
    pub fn record_reconnect_attempt(&mut self) -> u32 {
        self.reconnect_attempts += 1;
        self.reconnect_attempts
    }

    pub fn can_serve_tools(&self) -> bool {
        self.status == MCPServerStatus::Connected
    }

    /// `"<serverId>/<toolName>"` namespacing used for proxy tool ids
    /// (spec §3 ownership rule, §4.2 discover).
    pub fn namespaced_tool_id(&self, tool_name: &str) -> String {
        format!("{}/{}", self.config.id, tool_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(lazy: bool) -> MCPServerConfig {
        MCPServerConfig {
            id: "docs".into(),
            transport: Transport::Stdio,
            connection: ConnectionParams::Stdio {
                command: "docs-server".into(),
                args: vec![],
            },
            health_check_interval: Some(Duration::from_millis(50)),
            reconnect_policy: ReconnectPolicy::default(),
            lazy,
        }
    }

    #[test]
    fn lazy_server_starts_unregistered() {
        let entry = MCPServerEntry::new(config(true));
        assert_eq!(entry.status, MCPServerStatus::Unregistered);
    }

    #[test]
    fn reconnect_backoff_is_powers_of_two() {
        let policy = ReconnectPolicy { max_retries: 3 };
        assert_eq!(policy.backoff_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_for_attempt(1), Duration::from_secs(2));
    }

    #[test]
    fn namespaced_tool_id_matches_server_slash_tool_shape() {
        let entry = MCPServerEntry::new(config(false));
        assert_eq!(entry.namespaced_tool_id("search"), "docs/search");
    }

    #[test]
    fn disconnected_entry_serves_no_tools() {
        let mut entry = MCPServerEntry::new(config(false));
        entry.mark_connected();
        entry.mark_disconnected();
        assert!(!entry.can_serve_tools());
    }

    #[test]
    fn reconnect_attempts_increment_and_reset_on_connect() {
        let mut entry = MCPServerEntry::new(config(false));
        assert_eq!(entry.record_reconnect_attempt(), 1);
        assert_eq!(entry.record_reconnect_attempt(), 2);
        entry.mark_connected();
        assert_eq!(entry.reconnect_attempts, 0);
    }
}
