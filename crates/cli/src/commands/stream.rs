// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! `agentflow stream`: drive one streaming turn and print each
//! `StreamEvent` as a line of NDJSON, in emission order, as it arrives.

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
    let mut receiver = engine
        .turn_coordinator
        .clone()
        .stream_message(message, options)
        .await?;

    while let Some(event) = receiver.recv().await {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}
