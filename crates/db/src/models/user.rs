//! User entity model and the DTO for import-created users.

use sqlx::FromRow;
use examdesk_core::types::{DbId, Timestamp};

/// Full user row from the `users` table.
///
/// Contains the password hash. Never serialize it to API responses.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub password_hash: String,
    pub role_id: DbId,
    pub must_change_password: bool,
    pub is_active: bool,
    pub import_batch_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for a user created by a bulk import.
#[derive(Debug, Clone)]
pub struct CreateImportedUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub password_hash: String,
    /// Role name as stored in `roles.name` (e.g. `"super_admin"`).
    pub role_name: String,
    pub import_batch_id: String,
}
