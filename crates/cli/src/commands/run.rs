// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! `agentflow run`: drive one non-streaming turn and print the result as
//! pretty JSON, mirroring the teacher's `commands::task::handle_command`
//! one-shot request/response shape.

use std::path::Path;

use agentflow_core::application::TurnOptions;
use anyhow::Result;

use crate::commands::build_offline_engine;
use crate::config_file::load;

pub async fn execute(config_path: &Path, message: String, conversation_id: Option<String>) -> Result<()> {
    let config = load(config_path)?;
    let engine = build_offline_engine(config)?;

    let options = TurnOptions {
        conversation_id,
        require_conversation_id: false,
    };
    let result = engine.turn_coordinator.process_message(message, options).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
