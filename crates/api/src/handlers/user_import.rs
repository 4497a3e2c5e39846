//! Handlers for bulk user import sessions.
//!
//! A session walks one CSV upload through validation, preview, processing,
//! and optional rollback. All JSON responses use the `{ "data": ... }`
//! envelope; the template and error log are served as CSV attachments.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use examdesk_core::error::CoreError;
use examdesk_core::user_import::directory::candidate_emails;
use examdesk_core::user_import::export::{template_csv, ERROR_LOG_FILE_NAME, TEMPLATE_FILE_NAME};
use examdesk_core::user_import::flow::read_upload;
use examdesk_core::user_import::{
    ImportBatch, ImportFlow, ImportStep, KnownEmails, PreviewGrid, RowCounts, RowEdit, UploadRow,
    UploadedFile, ValidationIssue,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::processing::spawn_import;
use crate::response::DataResponse;
use crate::state::AppState;

/// Name of the multipart field carrying the CSV file.
pub const UPLOAD_FIELD: &str = "file";

const CSV_MIME: &str = "text/csv; charset=utf-8";

// ── Response types ───────────────────────────────────────────────────

/// Everything the client needs to render a session.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub step: ImportStep,
    pub batch_id: Option<String>,
    pub file_name: Option<String>,
    pub counts: RowCounts,
    pub rows: Vec<UploadRow>,
    pub issues: Vec<ValidationIssue>,
    pub batch: Option<ImportBatch>,
}

impl SessionSnapshot {
    fn of(session_id: Uuid, flow: &ImportFlow) -> Self {
        let upload = flow.upload();
        Self {
            session_id,
            step: flow.step(),
            batch_id: upload.map(|u| u.batch_id.clone()),
            file_name: upload.map(|u| u.file_name.clone()),
            counts: upload.map(|u| u.grid.counts()).unwrap_or_default(),
            rows: flow.rows().to_vec(),
            issues: upload.map(|u| u.issues.clone()).unwrap_or_default(),
            batch: flow.batch().cloned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub step: ImportStep,
    pub batch: ImportBatch,
}

#[derive(Debug, Serialize)]
pub struct RollbackResponse {
    pub batch: ImportBatch,
    pub deleted_users: u64,
}

// ── Request types ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct StartImportRequest {
    /// Operator recorded on the batch.
    #[validate(length(min = 1, max = 320))]
    pub imported_by: String,
}

/// Inline edit of a preview row. Omitted fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct RowEditRequest {
    #[validate(length(max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 320))]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub role: Option<String>,
}

impl From<RowEditRequest> for RowEdit {
    fn from(req: RowEditRequest) -> Self {
        RowEdit {
            name: req.name,
            email: req.email,
            role: req.role,
        }
    }
}

// ── Template ─────────────────────────────────────────────────────────

/// GET /api/v1/admin/user-imports/template
pub async fn download_template() -> impl IntoResponse {
    csv_attachment(TEMPLATE_FILE_NAME, template_csv().to_string())
}

// ── Sessions ─────────────────────────────────────────────────────────

/// POST /api/v1/admin/user-imports/sessions
pub async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<DataResponse<SessionSnapshot>>) {
    let (id, flow) = state.sessions.create().await;
    tracing::info!(session_id = %id, "Import session created");
    let snapshot = SessionSnapshot::of(id, &*flow.lock().await);
    (StatusCode::CREATED, Json(DataResponse { data: snapshot }))
}

/// GET /api/v1/admin/user-imports/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<SessionSnapshot>>> {
    let flow = state.sessions.get(id).await?;
    let snapshot = SessionSnapshot::of(id, &*flow.lock().await);
    Ok(Json(DataResponse { data: snapshot }))
}

/// DELETE /api/v1/admin/user-imports/sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.sessions.remove(id).await?;
    tracing::info!(session_id = %id, "Import session deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ── Upload ───────────────────────────────────────────────────────────

/// POST /api/v1/admin/user-imports/sessions/{id}/upload
///
/// Accept a multipart `file` field, run it through the upload gate and
/// the validator, and move the session to the preview step.
pub async fn upload_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<DataResponse<SessionSnapshot>>> {
    let flow = state.sessions.get(id).await?;
    let import = &state.config.import;

    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, import.max_file_size_mb()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, import.max_file_size_mb()))?;
        file = Some(UploadedFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }
    let file = file.ok_or_else(|| {
        AppError::BadRequest(format!("Missing multipart field '{UPLOAD_FIELD}'"))
    })?;

    let raw = read_upload(&file, import)?;
    let existing = state.store.existing_emails(&candidate_emails(&raw)).await?;
    let known: KnownEmails = existing.iter().collect();

    let mut flow = flow.lock().await;
    let upload = flow.accept_rows(file.file_name, raw, &known, chrono::Utc::now())?;
    let counts = upload.grid.counts();
    tracing::info!(
        session_id = %id,
        batch_id = %upload.batch_id,
        total = counts.total,
        success = counts.success,
        ignore = counts.ignore,
        error = counts.error,
        "CSV upload validated",
    );

    Ok(Json(DataResponse {
        data: SessionSnapshot::of(id, &flow),
    }))
}

/// DELETE /api/v1/admin/user-imports/sessions/{id}/upload
pub async fn discard_upload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<SessionSnapshot>>> {
    let flow = state.sessions.get(id).await?;
    let mut flow = flow.lock().await;
    flow.discard_upload()?;
    Ok(Json(DataResponse {
        data: SessionSnapshot::of(id, &flow),
    }))
}

// ── Preview ──────────────────────────────────────────────────────────

/// PATCH /api/v1/admin/user-imports/sessions/{id}/rows/{row}
///
/// Apply an inline edit to one row and revalidate it.
///
/// The existing-user lookup runs against the email the row ends up with, so
/// renaming an `ignore` row does not turn it into a new user. The session
/// stays locked across the lookup.
pub async fn edit_row(
    State(state): State<AppState>,
    Path((id, row)): Path<(Uuid, usize)>,
    Json(input): Json<RowEditRequest>,
) -> AppResult<Json<DataResponse<UploadRow>>> {
    input.validate()?;
    let edit: RowEdit = input.into();
    let flow = state.sessions.get(id).await?;
    let mut flow = flow.lock().await;

    let email = flow.grid_mut()?.edited_email(row, &edit)?.to_lowercase();
    let candidates: Vec<String> = Some(email).into_iter().filter(|e| !e.is_empty()).collect();
    let known: KnownEmails = state.store.existing_emails(&candidates).await?.iter().collect();

    let updated = flow.grid_mut()?.apply_edit(row, edit, &known)?.clone();
    tracing::debug!(
        session_id = %id,
        row,
        status = %updated.validation_status,
        "Preview row edited",
    );
    Ok(Json(DataResponse { data: updated }))
}

/// POST /api/v1/admin/user-imports/sessions/{id}/rows/{row}/toggle
pub async fn toggle_row(
    State(state): State<AppState>,
    Path((id, row)): Path<(Uuid, usize)>,
) -> AppResult<Json<DataResponse<SessionSnapshot>>> {
    with_grid(&state, id, |grid| grid.toggle_selection(row).map(|_| ())).await
}

/// POST /api/v1/admin/user-imports/sessions/{id}/rows/{row}/edit
///
/// Mark a row as being edited in the grid.
pub async fn begin_edit(
    State(state): State<AppState>,
    Path((id, row)): Path<(Uuid, usize)>,
) -> AppResult<Json<DataResponse<SessionSnapshot>>> {
    with_grid(&state, id, |grid| grid.begin_edit(row)).await
}

/// DELETE /api/v1/admin/user-imports/sessions/{id}/rows/{row}/edit
pub async fn cancel_edit(
    State(state): State<AppState>,
    Path((id, row)): Path<(Uuid, usize)>,
) -> AppResult<Json<DataResponse<SessionSnapshot>>> {
    with_grid(&state, id, |grid| grid.cancel_edit(row)).await
}

/// POST /api/v1/admin/user-imports/sessions/{id}/select-all
pub async fn select_all(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<SessionSnapshot>>> {
    with_grid(&state, id, |grid| {
        grid.select_all_valid();
        Ok(())
    })
    .await
}

/// POST /api/v1/admin/user-imports/sessions/{id}/deselect-all
pub async fn deselect_all(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<SessionSnapshot>>> {
    with_grid(&state, id, |grid| {
        grid.deselect_all();
        Ok(())
    })
    .await
}

async fn with_grid<F>(
    state: &AppState,
    id: Uuid,
    apply: F,
) -> AppResult<Json<DataResponse<SessionSnapshot>>>
where
    F: FnOnce(&mut PreviewGrid) -> Result<(), CoreError>,
{
    let flow = state.sessions.get(id).await?;
    let mut flow = flow.lock().await;
    apply(flow.grid_mut()?)?;
    Ok(Json(DataResponse {
        data: SessionSnapshot::of(id, &flow),
    }))
}

// ── Processing ───────────────────────────────────────────────────────

/// POST /api/v1/admin/user-imports/sessions/{id}/start
///
/// Start importing the selected rows. Returns `202 Accepted` with the new
/// batch; poll the progress endpoint for updates.
pub async fn start_import(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<StartImportRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<ImportBatch>>)> {
    input.validate()?;
    let shared = state.sessions.get(id).await?;

    let (batch, rows) = {
        let mut flow = shared.lock().await;
        let batch = flow
            .start_import(input.imported_by.trim().to_string(), chrono::Utc::now())?
            .clone();
        let rows = flow
            .upload()
            .map(|u| u.grid.selected_rows())
            .unwrap_or_default();
        (batch, rows)
    };
    tracing::info!(
        session_id = %id,
        batch_id = %batch.batch_id,
        selected = batch.total_rows,
        imported_by = %batch.imported_by,
        "Import started",
    );

    spawn_import(
        id,
        shared,
        state.store.clone(),
        state.notifier.clone(),
        state.config.import.clone(),
        batch.clone(),
        rows,
    );

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: batch })))
}

/// GET /api/v1/admin/user-imports/sessions/{id}/progress
pub async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<ProgressResponse>>> {
    let flow = state.sessions.get(id).await?;
    let flow = flow.lock().await;
    let batch = flow.batch().cloned().ok_or_else(|| {
        CoreError::Conflict("No import has been started in this session".to_string())
    })?;
    Ok(Json(DataResponse {
        data: ProgressResponse {
            step: flow.step(),
            batch,
        },
    }))
}

// ── Completion ───────────────────────────────────────────────────────

/// POST /api/v1/admin/user-imports/sessions/{id}/rollback
///
/// Delete every user created by the session's batch and return to the
/// upload step. The flow stays locked until the store is done so a second
/// rollback cannot race the first.
pub async fn rollback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<RollbackResponse>>> {
    let flow = state.sessions.get(id).await?;
    let mut flow = flow.lock().await;

    let batch_id = flow.rollback_target(chrono::Utc::now())?.to_string();
    let deleted_users = state.store.delete_batch(&batch_id).await?;
    let batch = flow.finish_rollback()?;
    tracing::info!(session_id = %id, %batch_id, deleted_users, "Import rolled back");

    Ok(Json(DataResponse {
        data: RollbackResponse {
            batch,
            deleted_users,
        },
    }))
}

/// POST /api/v1/admin/user-imports/sessions/{id}/start-over
pub async fn start_over(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<SessionSnapshot>>> {
    let flow = state.sessions.get(id).await?;
    let mut flow = flow.lock().await;
    flow.start_over()?;
    Ok(Json(DataResponse {
        data: SessionSnapshot::of(id, &flow),
    }))
}

/// GET /api/v1/admin/user-imports/sessions/{id}/error-log
pub async fn download_error_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let flow = state.sessions.get(id).await?;
    let csv = flow.lock().await.error_log_csv()?;
    Ok(csv_attachment(ERROR_LOG_FILE_NAME, csv))
}

// ── Helpers ──────────────────────────────────────────────────────────

fn csv_attachment(file_name: &str, body: String) -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, CSV_MIME.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
}

/// Oversized bodies are reported with the same message as the upload gate.
fn multipart_error(err: MultipartError, max_mb: u64) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Core(CoreError::Validation(format!(
            "File size exceeds the {max_mb} MB limit"
        )))
    } else {
        AppError::BadRequest(err.body_text())
    }
}
