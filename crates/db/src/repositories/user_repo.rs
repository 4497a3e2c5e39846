//! Repository for the `users` table, limited to what bulk import needs.

use sqlx::PgPool;

use crate::models::user::{CreateImportedUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, email, phone, date_of_birth, password_hash, role_id, \
                        must_change_password, is_active, import_batch_id, created_at, updated_at";

/// Provides the user queries used by bulk import.
pub struct UserRepo;

impl UserRepo {
    /// Return which of `emails` already belong to a user, lower-cased.
    ///
    /// Matching is case-insensitive; `emails` are expected lower-cased.
    pub async fn find_existing_emails(
        pool: &PgPool,
        emails: &[String],
    ) -> Result<Vec<String>, sqlx::Error> {
        if emails.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_scalar::<_, String>(
            "SELECT lower(email) FROM users WHERE lower(email) = ANY($1)",
        )
        .bind(emails)
        .fetch_all(pool)
        .await
    }

    /// Insert a user created by a bulk import. The user must change the
    /// temporary password on first login.
    ///
    /// An unknown role name leaves `role_id` NULL and the insert fails.
    pub async fn create_imported(
        pool: &PgPool,
        input: &CreateImportedUser,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users
                (name, email, phone, date_of_birth, password_hash, role_id,
                 must_change_password, import_batch_id)
             VALUES ($1, $2, $3, $4, $5, (SELECT id FROM roles WHERE name = $6), true, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.date_of_birth)
            .bind(&input.password_hash)
            .bind(&input.role_name)
            .bind(&input.import_batch_id)
            .fetch_one(pool)
            .await
    }

    /// Delete every user created under an import batch. Returns the number
    /// of deleted rows.
    pub async fn delete_by_batch(pool: &PgPool, batch_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE import_batch_id = $1")
            .bind(batch_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
