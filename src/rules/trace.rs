//! Audit trail of one applied move.

use serde::{Deserialize, Serialize};

use crate::core::PlayerId;

/// Why a `partial` pipeline skipped part of its work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum PartialStep {
    /// Cost validation failed, so cost effects did not run.
    CostSpendSkipped,
    /// A stage's `requires` condition was false.
    StageDeclined { stage: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TraceEntry {
    PipelineSelected { action_id: String, pipeline_id: String },
    CostPaid { pipeline_id: String },
    OperationPartial { pipeline_id: String, step: PartialStep },
    StageCompleted { pipeline_id: String, stage: String },
    FreeOperationConsumed { player: PlayerId, action_id: String },
    TriggerFired { trigger: String, depth: usize },
    /// Events left unmatched once the cascade hit `max_trigger_depth`.
    TriggerTruncated { depth: usize, pending: usize },
}
