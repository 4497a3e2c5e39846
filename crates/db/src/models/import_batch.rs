//! Import batch audit record.

use serde::Serialize;
use sqlx::FromRow;
use examdesk_core::types::{DbId, Timestamp};
use examdesk_core::user_import::ImportBatch;

/// A row from the `user_import_batches` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImportBatchRecord {
    pub id: DbId,
    pub batch_id: String,
    pub file_name: String,
    pub imported_by: String,
    pub status: String,
    pub total_rows: i32,
    pub processed_rows: i32,
    pub success_count: i32,
    pub ignore_count: i32,
    pub error_count: i32,
    pub rollback_deadline: Option<Timestamp>,
    pub failure_reason: Option<String>,
    pub started_at: Timestamp,
    pub rolled_back_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Column values written on every upsert of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertImportBatch {
    pub batch_id: String,
    pub file_name: String,
    pub imported_by: String,
    pub status: String,
    pub total_rows: i32,
    pub processed_rows: i32,
    pub success_count: i32,
    pub ignore_count: i32,
    pub error_count: i32,
    pub rollback_deadline: Option<Timestamp>,
    pub failure_reason: Option<String>,
    pub started_at: Timestamp,
}

impl From<&ImportBatch> for UpsertImportBatch {
    fn from(batch: &ImportBatch) -> Self {
        Self {
            batch_id: batch.batch_id.clone(),
            file_name: batch.file_name.clone(),
            imported_by: batch.imported_by.clone(),
            status: batch.status.as_str().to_string(),
            total_rows: count(batch.total_rows),
            processed_rows: count(batch.processed_rows),
            success_count: count(batch.success_count),
            ignore_count: count(batch.ignore_count),
            error_count: count(batch.error_count),
            rollback_deadline: batch.rollback_deadline,
            failure_reason: batch.failure_reason.clone(),
            started_at: batch.start_time,
        }
    }
}

/// Row counts are capped by the per-import limit, far below `i32::MAX`.
fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
