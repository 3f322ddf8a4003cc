// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Crate-wide error taxonomy (spec §7, SPEC_FULL §3.2). Unifies every
//! module's failure modes into one enum with a stable opaque `code` and a
//! `retryable()` predicate, so call sites match exhaustively instead of
//! sniffing error message substrings the way an upstream model-provider
//! error string must still be classified (see `ErrorClass` below, which
//! is the one place message-sniffing is unavoidable per spec §4.4 step 5).

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorClass {
    Retryable,
    User,
    Provider,
    Infrastructure,
    Unknown,
}

impl ErrorClass {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorClass::Retryable)
    }
}

/// Classifies a raw provider/tool error message into the taxonomy of
/// spec §4.4 step 5. This is the one place in the engine that sniffs
/// error text, because the upstream failure is itself just text by the
/// time it reaches the invoker.
pub fn classify_error_message(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        ErrorClass::Retryable
    } else if lower.contains("429") || lower.contains("rate limit") {
        ErrorClass::Retryable
    } else if lower.contains("503") || lower.contains("service unavailable") {
        ErrorClass::Retryable
    } else if lower.contains("validation") || lower.contains("invalid") && lower.contains("format")
    {
        ErrorClass::User
    } else if lower.contains("api key") || lower.contains("unauthorized") || lower.contains("401")
    {
        ErrorClass::Provider
    } else if lower.contains("database")
        || lower.contains("connection refused")
        || lower.contains("econnrefused")
    {
        ErrorClass::Infrastructure
    } else {
        ErrorClass::Unknown
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("message validation failed: {0}")]
    MessageValidation(String),
    #[error("conversation id is required but was not provided")]
    ConversationIdRequired,
    #[error("tool '{0}' is denied by policy")]
    PolicyDenied(String),
    #[error("tool '{tool_id}' requires approval")]
    ApprovalRequired { tool_id: String, prompt: String, ttl_ms: u64 },
    #[error("tool '{0}' input failed validation: {1}")]
    ToolValidation(String, String),
    #[error("tool '{0}' timed out after {1}ms")]
    ToolTimeout(String, u64),
    #[error("route execution failed: {0}")]
    RouteExecution(String),
    #[error("handoff depth limit reached")]
    HandoffLimit,
    #[error("unknown target agent '{0}'")]
    UnknownAgent(String),
    #[error("store error: {0}")]
    Store(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Stable, user-facing opaque code. Never includes raw error internals
    /// or stack traces (spec §7 propagation policy).
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::MessageValidation(_) => "MESSAGE_VALIDATION",
            EngineError::ConversationIdRequired => "CONVERSATION_ID_REQUIRED",
            EngineError::PolicyDenied(_) => "POLICY_DENIED",
            EngineError::ApprovalRequired { .. } => "APPROVAL_REQUIRED",
            EngineError::ToolValidation(..) => "VALIDATION",
            EngineError::ToolTimeout(..) => "TOOL_TIMEOUT",
            EngineError::RouteExecution(_) => "ROUTE_EXECUTION_ERROR",
            EngineError::HandoffLimit => "HANDOFF_LIMIT",
            EngineError::UnknownAgent(_) => "UNKNOWN_AGENT",
            EngineError::Store(_) => "STORE_ERROR",
            EngineError::Other(_) => "UNKNOWN",
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, EngineError::ToolTimeout(..))
    }

    /// Message safe to display to a user: short, no internals, no stack
    /// trace (spec §7).
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_timeout_as_retryable() {
        assert_eq!(classify_error_message("operation timed out"), ErrorClass::Retryable);
    }

    #[test]
    fn classifies_rate_limit_as_retryable() {
        assert_eq!(classify_error_message("429 too many requests"), ErrorClass::Retryable);
    }

    #[test]
    fn classifies_auth_as_provider() {
        assert_eq!(classify_error_message("401 unauthorized: bad api key"), ErrorClass::Provider);
    }

    #[test]
    fn classifies_db_as_infrastructure() {
        assert_eq!(
            classify_error_message("connection refused to database"),
            ErrorClass::Infrastructure
        );
    }

    #[test]
    fn classifies_unmatched_as_unknown() {
        assert_eq!(classify_error_message("something exploded"), ErrorClass::Unknown);
    }

    #[test]
    fn engine_error_codes_are_stable() {
        assert_eq!(EngineError::PolicyDenied("x".into()).code(), "POLICY_DENIED");
        assert_eq!(EngineError::HandoffLimit.code(), "HANDOFF_LIMIT");
    }
}
