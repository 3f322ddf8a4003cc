// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Command implementations for the `agentflow` binary. Kept as a library
//! so the command handlers are unit-testable without going through
//! `clap`'s argument parsing.

pub mod commands;
pub mod config_file;
