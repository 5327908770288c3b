//! Structured execution records for scheduled tasks.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Execution status of one task run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
        }
    }
}

/// One scheduler run: created `running` on start, updated exactly once on
/// completion, immutable thereafter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduledTaskLog {
    pub id: u64,
    pub task_name: String,
    pub task_type: String,
    pub execution_status: ExecutionStatus,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub duration_ms: Option<u64>,
    /// JSON summary of per-channel outcomes for the run.
    pub result_data: Option<String>,
    pub error_message: Option<String>,
    pub settled_count: Option<u64>,
    pub checked_count: Option<u64>,
    pub created_at: Timestamp,
}
