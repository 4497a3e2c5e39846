pub mod health;
pub mod user_import;

use axum::Router;
use examdesk_core::config::ImportConfig;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /admin/user-imports/template                          blank template CSV
/// /admin/user-imports/sessions                          create session
/// /admin/user-imports/sessions/{id}                     get, delete
/// /admin/user-imports/sessions/{id}/upload              upload (POST), discard (DELETE)
/// /admin/user-imports/sessions/{id}/rows/{row}          inline edit (PATCH)
/// /admin/user-imports/sessions/{id}/rows/{row}/toggle   toggle selection
/// /admin/user-imports/sessions/{id}/rows/{row}/edit     begin (POST), cancel (DELETE)
/// /admin/user-imports/sessions/{id}/select-all          select every valid row
/// /admin/user-imports/sessions/{id}/deselect-all        clear selection
/// /admin/user-imports/sessions/{id}/start               start processing
/// /admin/user-imports/sessions/{id}/progress            batch progress
/// /admin/user-imports/sessions/{id}/rollback            delete the batch's users
/// /admin/user-imports/sessions/{id}/start-over          back to upload
/// /admin/user-imports/sessions/{id}/error-log           error rows as CSV
/// ```
pub fn api_routes(import: &ImportConfig) -> Router<AppState> {
    Router::new().nest("/admin/user-imports", user_import::router(import))
}
