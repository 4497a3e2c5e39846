//! Route definitions for the `/admin/user-imports` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use axum::Router;
use examdesk_core::config::ImportConfig;

use crate::handlers::user_import;
use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Routes mounted at `/admin/user-imports`.
///
/// ```text
/// GET    /template                              -> download_template
/// POST   /sessions                              -> create_session
/// GET    /sessions/{id}                         -> get_session
/// DELETE /sessions/{id}                         -> delete_session
/// POST   /sessions/{id}/upload                  -> upload_file
/// DELETE /sessions/{id}/upload                  -> discard_upload
/// PATCH  /sessions/{id}/rows/{row}              -> edit_row
/// POST   /sessions/{id}/rows/{row}/toggle       -> toggle_row
/// POST   /sessions/{id}/rows/{row}/edit         -> begin_edit
/// DELETE /sessions/{id}/rows/{row}/edit         -> cancel_edit
/// POST   /sessions/{id}/select-all              -> select_all
/// POST   /sessions/{id}/deselect-all            -> deselect_all
/// POST   /sessions/{id}/start                   -> start_import
/// GET    /sessions/{id}/progress                -> get_progress
/// POST   /sessions/{id}/rollback                -> rollback
/// POST   /sessions/{id}/start-over              -> start_over
/// GET    /sessions/{id}/error-log               -> download_error_log
/// ```
pub fn router(import: &ImportConfig) -> Router<AppState> {
    let upload_limit = usize::try_from(import.max_file_size_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/template", get(user_import::download_template))
        .route("/sessions", post(user_import::create_session))
        .route(
            "/sessions/{id}",
            get(user_import::get_session).delete(user_import::delete_session),
        )
        .route(
            "/sessions/{id}/upload",
            post(user_import::upload_file)
                .delete(user_import::discard_upload)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/sessions/{id}/rows/{row}", patch(user_import::edit_row))
        .route("/sessions/{id}/rows/{row}/toggle", post(user_import::toggle_row))
        .route(
            "/sessions/{id}/rows/{row}/edit",
            post(user_import::begin_edit).delete(user_import::cancel_edit),
        )
        .route("/sessions/{id}/select-all", post(user_import::select_all))
        .route("/sessions/{id}/deselect-all", post(user_import::deselect_all))
        .route("/sessions/{id}/start", post(user_import::start_import))
        .route("/sessions/{id}/progress", get(user_import::get_progress))
        .route("/sessions/{id}/rollback", post(user_import::rollback))
        .route("/sessions/{id}/start-over", post(user_import::start_over))
        .route("/sessions/{id}/error-log", get(user_import::download_error_log))
}
