use std::sync::Arc;
use std::time::Instant;

use tracing::error;

use tollgate_core::error::TollgateError;
use tollgate_core::tasklog::{ExecutionStatus, ScheduledTaskLog};
use tollgate_core::types::unix_now;
use tollgate_store::Store;

/// One in-flight task execution: a `running` row plus a monotonic start
/// instant for the duration measurement. Completed exactly once.
pub struct TaskRun {
    store: Arc<Store>,
    log: ScheduledTaskLog,
    started: Instant,
}

impl TaskRun {
    /// Open a `running` record for this execution.
    pub fn start(
        store: Arc<Store>,
        task_name: &str,
        task_type: &str,
    ) -> Result<Self, TollgateError> {
        let log = store.create_task_log(task_name, task_type, unix_now())?;
        Ok(Self {
            store,
            log,
            started: Instant::now(),
        })
    }

    pub fn id(&self) -> u64 {
        self.log.id
    }

    fn complete(
        mut self,
        status: ExecutionStatus,
        result_data: Option<serde_json::Value>,
        error_message: Option<String>,
        settled_count: Option<u64>,
        checked_count: Option<u64>,
    ) -> Result<ScheduledTaskLog, TollgateError> {
        self.log.execution_status = status;
        self.log.completed_at = Some(unix_now());
        self.log.duration_ms = Some(self.started.elapsed().as_millis() as u64);
        self.log.result_data = result_data.map(|v| v.to_string());
        self.log.error_message = error_message;
        self.log.settled_count = settled_count;
        self.log.checked_count = checked_count;
        self.store.put_task_log(&self.log)?;
        Ok(self.log)
    }

    pub fn success(
        self,
        result_data: serde_json::Value,
        settled_count: Option<u64>,
        checked_count: Option<u64>,
    ) -> Result<ScheduledTaskLog, TollgateError> {
        self.complete(
            ExecutionStatus::Success,
            Some(result_data),
            None,
            settled_count,
            checked_count,
        )
    }

    pub fn failure(
        self,
        result_data: serde_json::Value,
        error_message: String,
        settled_count: Option<u64>,
        checked_count: Option<u64>,
    ) -> Result<ScheduledTaskLog, TollgateError> {
        error!(task = %self.log.task_name, error = %error_message, "task run failed");
        self.complete(
            ExecutionStatus::Failed,
            Some(result_data),
            Some(error_message),
            settled_count,
            checked_count,
        )
    }
}
