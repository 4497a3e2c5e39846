//! Where imported users are created and rolled back.
//!
//! [`UserStore`] is the seam between the import flow and user persistence.
//! [`PgUserStore`] writes to PostgreSQL; [`InMemoryUserStore`] keeps users in
//! process memory for the simulated backend and for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use examdesk_core::error::CoreError;
use examdesk_core::roles::Role;
use examdesk_core::user_import::{ImportBatch, UploadRow};
use examdesk_db::models::import_batch::UpsertImportBatch;
use examdesk_db::models::user::CreateImportedUser;
use examdesk_db::repositories::{ImportBatchRepo, UserRepo};
use examdesk_db::DbPool;
use tokio::sync::RwLock;

use crate::credentials::IssuedCredentials;
use crate::error::{AppError, AppResult};
use crate::password::{generate_temporary_password, hash_password};

/// Persistence for users created by bulk import.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Short name for logs and the health endpoint.
    fn name(&self) -> &'static str;

    /// Which of `emails` (lower-cased) already belong to a user.
    async fn existing_emails(&self, emails: &[String]) -> AppResult<Vec<String>>;

    /// Create one user from a validated row, tagged with `batch_id`.
    ///
    /// Returns the generated temporary password for delivery. Only its hash
    /// is persisted.
    async fn create_user(&self, batch_id: &str, row: &UploadRow) -> AppResult<IssuedCredentials>;

    /// Delete every user tagged with `batch_id`. Returns how many were deleted.
    async fn delete_batch(&self, batch_id: &str) -> AppResult<u64>;

    /// Record the current state of a batch.
    async fn save_batch(&self, batch: &ImportBatch) -> AppResult<()>;

    async fn health_check(&self) -> bool;
}

fn parse_role(row: &UploadRow) -> AppResult<Role> {
    Role::parse(&row.role).ok_or_else(|| {
        AppError::Core(CoreError::Validation(format!(
            "Row {} has an invalid role: {}",
            row.row_number, row.role
        )))
    })
}

fn issued(name: String, email: String, temporary_password: String) -> IssuedCredentials {
    IssuedCredentials {
        name,
        email,
        temporary_password,
    }
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ── PostgreSQL ───────────────────────────────────────────────────────

/// Creates imported users in the `users` table.
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn existing_emails(&self, emails: &[String]) -> AppResult<Vec<String>> {
        Ok(UserRepo::find_existing_emails(&self.pool, emails).await?)
    }

    async fn create_user(&self, batch_id: &str, row: &UploadRow) -> AppResult<IssuedCredentials> {
        let role = parse_role(row)?;
        let password = generate_temporary_password();
        let password_hash = hash_password(&password)
            .map_err(|e| AppError::InternalError(format!("Failed to hash password: {e}")))?;

        let user = UserRepo::create_imported(
            &self.pool,
            &CreateImportedUser {
                name: row.name.trim().to_string(),
                email: row.email.trim().to_lowercase(),
                phone: optional(&row.phone),
                date_of_birth: optional(&row.date_of_birth),
                password_hash,
                role_name: role.db_name().to_string(),
                import_batch_id: batch_id.to_string(),
            },
        )
        .await?;

        tracing::debug!(user_id = user.id, batch_id, row = row.row_number, "Imported user created");
        Ok(issued(user.name, user.email, password))
    }

    async fn delete_batch(&self, batch_id: &str) -> AppResult<u64> {
        let deleted = UserRepo::delete_by_batch(&self.pool, batch_id).await?;
        ImportBatchRepo::mark_rolled_back(&self.pool, batch_id).await?;
        Ok(deleted)
    }

    async fn save_batch(&self, batch: &ImportBatch) -> AppResult<()> {
        ImportBatchRepo::upsert(&self.pool, &UpsertImportBatch::from(batch)).await?;
        Ok(())
    }

    async fn health_check(&self) -> bool {
        examdesk_db::health_check(&self.pool).await.is_ok()
    }
}

// ── In memory ────────────────────────────────────────────────────────

/// A user held by [`InMemoryUserStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub role: Role,
    pub must_change_password: bool,
    /// `None` for users that existed before any import.
    pub import_batch_id: Option<String>,
}

impl StoredUser {
    /// A pre-existing admin with no import tag.
    fn existing(email: String) -> Self {
        Self {
            name: email.clone(),
            email,
            phone: None,
            date_of_birth: None,
            role: Role::Admin,
            must_change_password: false,
            import_batch_id: None,
        }
    }
}

/// Keeps users and batches in process memory. Emails are keyed lower-cased.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, StoredUser>>,
    batches: RwLock<HashMap<String, ImportBatch>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds an `Admin` user for each of `emails`.
    pub fn with_existing<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let users = emails
            .into_iter()
            .map(|email| {
                let email = email.as_ref().trim().to_lowercase();
                (email.clone(), StoredUser::existing(email))
            })
            .collect();
        Self {
            users: RwLock::new(users),
            batches: RwLock::default(),
        }
    }

    /// Add a pre-existing user outside of any import.
    pub async fn insert_existing(&self, email: &str) {
        let email = email.trim().to_lowercase();
        self.users
            .write()
            .await
            .insert(email.clone(), StoredUser::existing(email));
    }

    pub async fn user(&self, email: &str) -> Option<StoredUser> {
        self.users.read().await.get(&email.trim().to_lowercase()).cloned()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    /// The last saved state of a batch.
    pub async fn batch(&self, batch_id: &str) -> Option<ImportBatch> {
        self.batches.read().await.get(batch_id).cloned()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn existing_emails(&self, emails: &[String]) -> AppResult<Vec<String>> {
        let users = self.users.read().await;
        Ok(emails
            .iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| users.contains_key(e))
            .collect())
    }

    async fn create_user(&self, batch_id: &str, row: &UploadRow) -> AppResult<IssuedCredentials> {
        let role = parse_role(row)?;
        let email = row.email.trim().to_lowercase();
        let name = row.name.trim().to_string();

        let mut users = self.users.write().await;
        if users.contains_key(&email) {
            return Err(AppError::Core(CoreError::Conflict(format!(
                "User with email {email} already exists"
            ))));
        }
        users.insert(
            email.clone(),
            StoredUser {
                name: name.clone(),
                email: email.clone(),
                phone: optional(&row.phone),
                date_of_birth: optional(&row.date_of_birth),
                role,
                must_change_password: true,
                import_batch_id: Some(batch_id.to_string()),
            },
        );
        Ok(issued(name, email, generate_temporary_password()))
    }

    async fn delete_batch(&self, batch_id: &str) -> AppResult<u64> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|_, u| u.import_batch_id.as_deref() != Some(batch_id));
        Ok((before - users.len()) as u64)
    }

    async fn save_batch(&self, batch: &ImportBatch) -> AppResult<()> {
        self.batches
            .write()
            .await
            .insert(batch.batch_id.clone(), batch.clone());
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
