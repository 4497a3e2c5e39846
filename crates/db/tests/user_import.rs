//! Integration tests for the bulk import repositories.
//!
//! Exercises the SQL against a real database:
//! - Case-insensitive existing-email lookup
//! - Imported user creation with role lookup
//! - Email uniqueness and unknown roles
//! - Deleting by batch tag
//! - Batch upsert and rollback stamping

use chrono::TimeZone;
use examdesk_core::types::Timestamp;
use examdesk_core::user_import::{BatchStatus, ImportBatch};
use examdesk_db::models::import_batch::UpsertImportBatch;
use examdesk_db::models::user::CreateImportedUser;
use examdesk_db::repositories::{ImportBatchRepo, UserRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_user(email: &str, role_name: &str, batch_id: &str) -> CreateImportedUser {
    CreateImportedUser {
        name: "Ann Lee".to_string(),
        email: email.to_string(),
        phone: None,
        date_of_birth: Some("1990-01-02".to_string()),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        role_name: role_name.to_string(),
        import_batch_id: batch_id.to_string(),
    }
}

fn started_at() -> Timestamp {
    chrono::Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn new_batch(batch_id: &str) -> ImportBatch {
    let mut batch = ImportBatch::new(
        batch_id.to_string(),
        "users.csv".to_string(),
        "admin@example.com".to_string(),
        started_at(),
        2,
        1,
        0,
    );
    batch.status = BatchStatus::Processing;
    batch
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_existing_email_lookup_ignores_case(pool: PgPool) {
    UserRepo::create_imported(&pool, &new_user("Ann@Example.com", "admin", "B-1"))
        .await
        .unwrap();

    let found = UserRepo::find_existing_emails(
        &pool,
        &["ann@example.com".to_string(), "bob@example.com".to_string()],
    )
    .await
    .unwrap();
    assert_eq!(found, vec!["ann@example.com".to_string()]);

    let none = UserRepo::find_existing_emails(&pool, &[]).await.unwrap();
    assert!(none.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_create_imported_user(pool: PgPool) {
    let user = UserRepo::create_imported(&pool, &new_user("ann@example.com", "super_admin", "B-1"))
        .await
        .unwrap();

    let role_id: i64 = sqlx::query_scalar("SELECT id FROM roles WHERE name = 'super_admin'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(user.role_id, role_id);
    assert_eq!(user.email, "ann@example.com");
    assert_eq!(user.phone, None);
    assert_eq!(user.date_of_birth.as_deref(), Some("1990-01-02"));
    assert!(user.must_change_password);
    assert!(user.is_active);
    assert_eq!(user.import_batch_id.as_deref(), Some("B-1"));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_duplicate_email_rejected_regardless_of_case(pool: PgPool) {
    UserRepo::create_imported(&pool, &new_user("ann@example.com", "admin", "B-1"))
        .await
        .unwrap();
    let result =
        UserRepo::create_imported(&pool, &new_user("ANN@example.com", "creator", "B-2")).await;
    assert!(result.is_err());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_unknown_role_rejected(pool: PgPool) {
    let result = UserRepo::create_imported(&pool, &new_user("ann@example.com", "wizard", "B-1")).await;
    assert!(result.is_err());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_delete_by_batch_only_removes_that_batch(pool: PgPool) {
    for (email, batch) in [
        ("a@example.com", "B-1"),
        ("b@example.com", "B-1"),
        ("c@example.com", "B-2"),
    ] {
        UserRepo::create_imported(&pool, &new_user(email, "reviewer", batch))
            .await
            .unwrap();
    }

    assert_eq!(UserRepo::delete_by_batch(&pool, "B-1").await.unwrap(), 2);
    assert_eq!(UserRepo::delete_by_batch(&pool, "B-1").await.unwrap(), 0);

    let remaining = UserRepo::find_existing_emails(
        &pool,
        &[
            "a@example.com".to_string(),
            "b@example.com".to_string(),
            "c@example.com".to_string(),
        ],
    )
    .await
    .unwrap();
    assert_eq!(remaining, vec!["c@example.com".to_string()]);
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_upsert_overwrites_progress(pool: PgPool) {
    let mut batch = new_batch("BATCH-1");
    let first = ImportBatchRepo::upsert(&pool, &UpsertImportBatch::from(&batch))
        .await
        .unwrap();
    assert_eq!(first.status, "processing");
    assert_eq!(first.processed_rows, 0);
    assert_eq!(first.ignore_count, 1);
    assert_eq!(first.rollback_deadline, None);

    batch.record_row();
    batch.record_row();
    batch.complete(chrono::Duration::minutes(30));
    let second = ImportBatchRepo::upsert(&pool, &UpsertImportBatch::from(&batch))
        .await
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.status, "completed");
    assert_eq!(second.processed_rows, 2);
    assert_eq!(second.success_count, 2);
    assert_eq!(second.started_at, started_at());
    assert_eq!(
        second.rollback_deadline,
        Some(started_at() + chrono::Duration::minutes(30))
    );

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_import_batches")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_upsert_records_failure_reason(pool: PgPool) {
    let mut batch = new_batch("BATCH-2");
    batch.record_row();
    batch.fail("Row 3: Conflict".to_string());

    let record = ImportBatchRepo::upsert(&pool, &UpsertImportBatch::from(&batch))
        .await
        .unwrap();
    assert_eq!(record.status, "failed");
    assert_eq!(record.processed_rows, 1);
    assert_eq!(record.failure_reason.as_deref(), Some("Row 3: Conflict"));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_mark_rolled_back_is_idempotent(pool: PgPool) {
    ImportBatchRepo::upsert(&pool, &UpsertImportBatch::from(&new_batch("BATCH-3")))
        .await
        .unwrap();

    assert!(ImportBatchRepo::mark_rolled_back(&pool, "BATCH-3").await.unwrap());
    assert!(!ImportBatchRepo::mark_rolled_back(&pool, "BATCH-3").await.unwrap());
    assert!(!ImportBatchRepo::mark_rolled_back(&pool, "BATCH-404").await.unwrap());

    let stamped: Option<Timestamp> = sqlx::query_scalar(
        "SELECT rolled_back_at FROM user_import_batches WHERE batch_id = 'BATCH-3'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(stamped.is_some());
}
