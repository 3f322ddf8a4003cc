// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Application services: the nine orchestration components (C1-C9) that sit
//! between the domain model and the host's infrastructure adapters.

pub mod agent_step_loop;
pub mod handoff_controller;
pub mod mcp_registry;
pub mod router;
pub mod stream_pipeline;
pub mod tool_gate;
pub mod tool_invoker;
pub mod tool_registry;
pub mod turn_coordinator;

pub use agent_step_loop::{AgentStepLoop, HandoffSignal, StepLoopOutcome, HANDOFF_TOOL_ID};
pub use handoff_controller::{HandoffController, HopRequest, MAX_HANDOFF_DEPTH};
pub use mcp_registry::{McpClient, McpClientRegistry, McpRegistryError, McpToolSpec};
pub use router::{RouteTarget, RouteVia, Router};
pub use stream_pipeline::{EmitError, StreamSink};
pub use tool_gate::{ApprovalRequest, ToolGate};
pub use tool_invoker::{InvocationContext, InvokeError, InvokeOutcome, ToolInvoker};
pub use tool_registry::{ToolRegistry, ToolRegistryError};
pub use turn_coordinator::{TurnCoordinator, TurnOptions};
