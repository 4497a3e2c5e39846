//! Repository for the `user_import_batches` table.

use sqlx::PgPool;

use crate::models::import_batch::{ImportBatchRecord, UpsertImportBatch};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, batch_id, file_name, imported_by, status, total_rows, processed_rows, \
                        success_count, ignore_count, error_count, rollback_deadline, \
                        failure_reason, started_at, rolled_back_at, created_at, updated_at";

/// Provides persistence for import batch audit records.
pub struct ImportBatchRepo;

impl ImportBatchRepo {
    /// Insert the batch, or overwrite its mutable columns if it exists.
    pub async fn upsert(
        pool: &PgPool,
        input: &UpsertImportBatch,
    ) -> Result<ImportBatchRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_import_batches
                (batch_id, file_name, imported_by, status, total_rows, processed_rows,
                 success_count, ignore_count, error_count, rollback_deadline,
                 failure_reason, started_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (batch_id) DO UPDATE SET
                status = EXCLUDED.status,
                processed_rows = EXCLUDED.processed_rows,
                success_count = EXCLUDED.success_count,
                rollback_deadline = EXCLUDED.rollback_deadline,
                failure_reason = EXCLUDED.failure_reason,
                updated_at = now()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportBatchRecord>(&query)
            .bind(&input.batch_id)
            .bind(&input.file_name)
            .bind(&input.imported_by)
            .bind(&input.status)
            .bind(input.total_rows)
            .bind(input.processed_rows)
            .bind(input.success_count)
            .bind(input.ignore_count)
            .bind(input.error_count)
            .bind(input.rollback_deadline)
            .bind(&input.failure_reason)
            .bind(input.started_at)
            .fetch_one(pool)
            .await
    }

    /// Stamp the batch as rolled back. Returns `false` if no batch matched.
    pub async fn mark_rolled_back(pool: &PgPool, batch_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_import_batches
             SET rolled_back_at = now(), updated_at = now()
             WHERE batch_id = $1 AND rolled_back_at IS NULL",
        )
        .bind(batch_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
