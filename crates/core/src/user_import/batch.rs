//! Import batch record and its progress bookkeeping.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Prefix of every generated batch identifier.
pub const BATCH_ID_PREFIX: &str = "BATCH";

/// Lifecycle status of an import batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the batch will see no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate a batch identifier: the upload timestamp in milliseconds plus a
/// short random suffix so concurrent uploads never share an id.
pub fn generate_batch_id(now: Timestamp) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{BATCH_ID_PREFIX}-{}-{}",
        now.timestamp_millis(),
        &suffix[..8]
    )
}

/// Percentage of `processed` over `total`, rounded to the nearest integer.
pub fn progress_percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (100.0 * processed as f64 / total as f64).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Progress and rollback state of one import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBatch {
    pub batch_id: String,
    pub file_name: String,
    pub start_time: Timestamp,
    pub imported_by: String,
    pub status: BatchStatus,
    /// Number of rows selected for import.
    pub total_rows: usize,
    pub processed_rows: usize,
    pub success_count: usize,
    /// Ignored rows in the whole upload, selected or not.
    pub ignore_count: usize,
    /// Error rows in the whole upload, selected or not.
    pub error_count: usize,
    pub progress: u8,
    pub can_rollback: bool,
    pub rollback_deadline: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl ImportBatch {
    /// A batch that has not processed any row yet.
    pub fn new(
        batch_id: String,
        file_name: String,
        imported_by: String,
        start_time: Timestamp,
        total_rows: usize,
        ignore_count: usize,
        error_count: usize,
    ) -> Self {
        Self {
            batch_id,
            file_name,
            start_time,
            imported_by,
            status: BatchStatus::Pending,
            total_rows,
            processed_rows: 0,
            success_count: 0,
            ignore_count,
            error_count,
            progress: 0,
            can_rollback: false,
            rollback_deadline: None,
            failure_reason: None,
        }
    }

    /// Count one more row as created.
    pub fn record_row(&mut self) {
        if self.processed_rows >= self.total_rows {
            return;
        }
        self.processed_rows += 1;
        self.success_count = self.processed_rows;
        self.progress = progress_percent(self.processed_rows, self.total_rows);
    }

    pub fn is_fully_processed(&self) -> bool {
        self.processed_rows == self.total_rows
    }

    /// Mark the batch completed and open the rollback window.
    pub fn complete(&mut self, rollback_window: chrono::Duration) {
        self.status = BatchStatus::Completed;
        self.progress = 100;
        self.can_rollback = true;
        self.rollback_deadline = Some(self.start_time + rollback_window);
    }

    /// Mark the batch failed, keeping the counts reached so far.
    pub fn fail(&mut self, reason: String) {
        self.status = BatchStatus::Failed;
        self.can_rollback = false;
        self.failure_reason = Some(reason);
    }
}
