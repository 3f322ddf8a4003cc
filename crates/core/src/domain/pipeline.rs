// Copyright (c) 2026 AgentFlow Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pipeline routing target and checkpoint shape (spec §3). Pipeline and
//! intent *execution* are external collaborators out of this engine's
//! scope; the engine only needs enough of a pipeline's identity to match
//! it as a Router (C8) target and enough of `Checkpoint` to keep handoff
//! and pipeline-resume vocabulary aligned.

use serde::{Deserialize, Serialize};

/// A pipeline the Router can select as a target by utterance match. The
/// pipeline's own step machinery lives outside this engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub id: String,
    #[serde(default)]
    pub utterances: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: String,
    pub pipeline_id: String,
    pub step: u32,
    pub status: CheckpointStatus,
    pub context: serde_json::Value,
}

/// At most one `in_progress` checkpoint may exist per `runId` (spec §3).
pub fn at_most_one_in_progress_per_run(checkpoints: &[Checkpoint]) -> bool {
    use std::collections::HashSet;
    let mut seen_in_progress: HashSet<&str> = HashSet::new();
    for checkpoint in checkpoints {
        if checkpoint.status == CheckpointStatus::InProgress {
            if !seen_in_progress.insert(checkpoint.run_id.as_str()) {
                return false;
            }
        }
    }
    true
}
