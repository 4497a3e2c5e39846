//! The bulk import state machine.
//!
//! ```text
//! Upload ──accept_upload──▶ Preview ──start_import──▶ Processing ──▶ Complete
//!   ▲                         │                      (record_row_processed,  │
//!   └──────discard_upload─────┘                       fail)                  │
//!   ▲                                                                        │
//!   └──────────────finish_rollback / start_over──────────────────────────────┘
//! ```
//!
//! Every transition is guarded; an illegal one returns
//! [`CoreError::Conflict`] and leaves the flow untouched.

use serde::{Deserialize, Serialize};

use crate::config::ImportConfig;
use crate::error::CoreError;
use crate::types::Timestamp;

use super::batch::{generate_batch_id, BatchStatus, ImportBatch};
use super::directory::UserDirectory;
use super::export::error_log_csv;
use super::gate::{check_upload, UploadedFile};
use super::parser::parse_rows;
use super::preview::PreviewGrid;
use super::row::{RawRow, UploadRow, ValidationIssue};
use super::validator::validate_rows;

/// The step the flow is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStep {
    Upload,
    Preview,
    Processing,
    Complete,
}

impl ImportStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Preview => "preview",
            Self::Processing => "processing",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for ImportStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated upload awaiting review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedUpload {
    pub batch_id: String,
    pub file_name: String,
    pub grid: PreviewGrid,
    pub issues: Vec<ValidationIssue>,
}

/// An upload whose import has started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveImport {
    pub upload: ValidatedUpload,
    pub batch: ImportBatch,
}

/// The import flow of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImportFlow {
    #[default]
    Upload,
    Preview(ValidatedUpload),
    Processing(ActiveImport),
    Complete(ActiveImport),
}

/// Run the gate and the parser on an upload.
///
/// Split from [`ImportFlow::accept_upload`] so callers with an async user
/// store can look up the candidate emails before validating.
pub fn read_upload(file: &UploadedFile, config: &ImportConfig) -> Result<Vec<RawRow>, CoreError> {
    let text = check_upload(file, config)?;
    parse_rows(&text, config.max_users_per_import)
}

impl ImportFlow {
    pub fn new() -> Self {
        Self::Upload
    }

    pub fn step(&self) -> ImportStep {
        match self {
            Self::Upload => ImportStep::Upload,
            Self::Preview(_) => ImportStep::Preview,
            Self::Processing(_) => ImportStep::Processing,
            Self::Complete(_) => ImportStep::Complete,
        }
    }

    /// The upload being reviewed or imported, from the preview step on.
    pub fn upload(&self) -> Option<&ValidatedUpload> {
        match self {
            Self::Upload => None,
            Self::Preview(upload) => Some(upload),
            Self::Processing(active) | Self::Complete(active) => Some(&active.upload),
        }
    }

    pub fn rows(&self) -> &[UploadRow] {
        self.upload().map(|u| u.grid.rows()).unwrap_or_default()
    }

    pub fn batch(&self) -> Option<&ImportBatch> {
        match self {
            Self::Processing(active) | Self::Complete(active) => Some(&active.batch),
            _ => None,
        }
    }

    /// Upload → Preview, reading the file through the gate and parser.
    ///
    /// On any rejection the flow stays in `Upload`.
    pub fn accept_upload(
        &mut self,
        file: &UploadedFile,
        directory: &dyn UserDirectory,
        config: &ImportConfig,
        now: Timestamp,
    ) -> Result<&ValidatedUpload, CoreError> {
        self.expect_step(ImportStep::Upload, "upload a file")?;
        let raw = read_upload(file, config)?;
        self.accept_rows(file.file_name.clone(), raw, directory, now)
    }

    /// Upload → Preview for rows that already passed the gate and parser.
    pub fn accept_rows(
        &mut self,
        file_name: String,
        raw: Vec<RawRow>,
        directory: &dyn UserDirectory,
        now: Timestamp,
    ) -> Result<&ValidatedUpload, CoreError> {
        self.expect_step(ImportStep::Upload, "upload a file")?;
        let (rows, issues) = validate_rows(raw, directory);
        *self = Self::Preview(ValidatedUpload {
            batch_id: generate_batch_id(now),
            file_name,
            grid: PreviewGrid::new(rows),
            issues,
        });
        match &*self {
            Self::Preview(upload) => Ok(upload),
            _ => unreachable!("flow was just set to preview"),
        }
    }

    /// Preview → Upload: discard the file and all its rows.
    pub fn discard_upload(&mut self) -> Result<(), CoreError> {
        self.expect_step(ImportStep::Preview, "discard the upload")?;
        *self = Self::Upload;
        Ok(())
    }

    /// Mutable access to the grid while the operator is reviewing it.
    pub fn grid_mut(&mut self) -> Result<&mut PreviewGrid, CoreError> {
        match self {
            Self::Preview(upload) => Ok(&mut upload.grid),
            other => Err(wrong_step(other.step(), "edit the preview")),
        }
    }

    /// Preview → Processing.
    ///
    /// Requires at least one selected row. The batch counts ignored and
    /// error rows across the whole upload, not just the selection.
    pub fn start_import(
        &mut self,
        imported_by: String,
        now: Timestamp,
    ) -> Result<&ImportBatch, CoreError> {
        let upload = match &mut *self {
            Self::Preview(upload) => upload,
            other => return Err(wrong_step(other.step(), "start the import")),
        };
        let counts = upload.grid.counts();
        if counts.selected == 0 {
            return Err(CoreError::Validation(
                "Please select at least one user to import".to_string(),
            ));
        }

        let mut batch = ImportBatch::new(
            upload.batch_id.clone(),
            upload.file_name.clone(),
            imported_by,
            now,
            counts.selected,
            counts.ignore,
            counts.error,
        );
        batch.status = BatchStatus::Processing;

        let Self::Preview(upload) = std::mem::take(self) else {
            unreachable!("step checked above");
        };
        *self = Self::Processing(ActiveImport { upload, batch });
        match &*self {
            Self::Processing(active) => Ok(&active.batch),
            _ => unreachable!("flow was just set to processing"),
        }
    }

    /// Count one selected row as created. The last row moves the flow to
    /// `Complete` and opens the rollback window.
    pub fn record_row_processed(
        &mut self,
        config: &ImportConfig,
    ) -> Result<&ImportBatch, CoreError> {
        let active = match &mut *self {
            Self::Processing(active) => active,
            other => return Err(wrong_step(other.step(), "record progress")),
        };
        active.batch.record_row();
        if active.batch.is_fully_processed() {
            active.batch.complete(config.rollback_window);
            self.finish_processing();
        }
        self.batch()
            .ok_or_else(|| CoreError::Internal("batch missing after progress".to_string()))
    }

    /// Processing → Complete with a failed batch.
    ///
    /// Users already created keep their batch tag, but a failed batch can
    /// never be rolled back: they stay until removed by hand.
    pub fn fail(&mut self, reason: String) -> Result<&ImportBatch, CoreError> {
        match &mut *self {
            Self::Processing(active) => active.batch.fail(reason),
            other => return Err(wrong_step(other.step(), "fail the import")),
        }
        self.finish_processing();
        self.batch()
            .ok_or_else(|| CoreError::Internal("batch missing after failure".to_string()))
    }

    /// Check that the batch may be rolled back at `now` and return its id.
    ///
    /// The caller deletes the batch's users and then calls
    /// [`ImportFlow::finish_rollback`].
    pub fn rollback_target(&self, now: Timestamp) -> Result<&str, CoreError> {
        let active = match self {
            Self::Complete(active) => active,
            other => return Err(wrong_step(other.step(), "roll back")),
        };
        if !active.batch.can_rollback {
            return Err(CoreError::Conflict(
                "This import can no longer be rolled back".to_string(),
            ));
        }
        match active.batch.rollback_deadline {
            Some(deadline) if now <= deadline => Ok(&active.batch.batch_id),
            _ => Err(CoreError::Conflict(
                "Rollback window has expired".to_string(),
            )),
        }
    }

    /// Complete → Upload after the batch's users were deleted. Returns the
    /// rolled-back batch with `can_rollback` cleared.
    pub fn finish_rollback(&mut self) -> Result<ImportBatch, CoreError> {
        let mut batch = match self {
            Self::Complete(active) if active.batch.can_rollback => active.batch.clone(),
            Self::Complete(_) => {
                return Err(CoreError::Conflict(
                    "This import can no longer be rolled back".to_string(),
                ))
            }
            other => return Err(wrong_step(other.step(), "roll back")),
        };
        batch.can_rollback = false;
        *self = Self::Upload;
        Ok(batch)
    }

    /// Complete → Upload, keeping the imported users.
    pub fn start_over(&mut self) -> Result<(), CoreError> {
        self.expect_step(ImportStep::Complete, "start a new import")?;
        *self = Self::Upload;
        Ok(())
    }

    /// Error rows as CSV. Available from the preview step on.
    pub fn error_log_csv(&self) -> Result<String, CoreError> {
        let upload = self
            .upload()
            .ok_or_else(|| wrong_step(ImportStep::Upload, "export the error log"))?;
        error_log_csv(upload.grid.rows())
    }

    fn finish_processing(&mut self) {
        if let Self::Processing(active) = std::mem::take(self) {
            *self = Self::Complete(active);
        }
    }

    fn expect_step(&self, expected: ImportStep, action: &str) -> Result<(), CoreError> {
        if self.step() == expected {
            Ok(())
        } else {
            Err(wrong_step(self.step(), action))
        }
    }
}

fn wrong_step(step: ImportStep, action: &str) -> CoreError {
    CoreError::Conflict(format!("Cannot {action} while the import is in the '{step}' step"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_import::directory::KnownEmails;
    use crate::user_import::row::ValidationStatus;
    use chrono::TimeZone;

    fn now() -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn csv_file(text: &str) -> UploadedFile {
        UploadedFile {
            file_name: "users.csv".into(),
            content_type: Some("text/csv".into()),
            bytes: text.as_bytes().to_vec(),
        }
    }

    fn directory() -> KnownEmails {
        ["existing@example.com"].into_iter().collect()
    }

    const MIXED: &str = "Name,Email,Phone,DOB,Role\n\
                         John,john@x.com,,,Creator\n\
                         Jane,bademail,,,Admin\n\
                         Old,existing@example.com,,,Admin\n\
                         Rita,rita@x.com,,,Reviewer\n";

    fn previewing() -> ImportFlow {
        let mut flow = ImportFlow::new();
        flow.accept_upload(&csv_file(MIXED), &directory(), &ImportConfig::default(), now())
            .unwrap();
        flow
    }

    #[test]
    fn upload_moves_to_preview_with_batch_id() {
        let flow = previewing();
        assert_eq!(flow.step(), ImportStep::Preview);
        let upload = flow.upload().unwrap();
        assert!(upload.batch_id.starts_with("BATCH-"));
        assert_eq!(upload.file_name, "users.csv");
        assert_eq!(flow.rows().len(), 4);
        assert_eq!(flow.rows()[0].validation_status, ValidationStatus::Success);
        assert_eq!(flow.rows()[1].status_reason, "Invalid email format");
    }

    #[test]
    fn rejected_upload_leaves_flow_in_upload() {
        let mut flow = ImportFlow::new();
        let mut big = csv_file("Name,Email,Role\n");
        big.bytes = vec![b'a'; 2_621_440];
        let err = flow
            .accept_upload(&big, &directory(), &ImportConfig::default(), now())
            .unwrap_err();
        assert!(err.to_string().contains("File size exceeds"));
        assert_eq!(flow.step(), ImportStep::Upload);
        assert!(flow.rows().is_empty());
    }

    #[test]
    fn too_many_rows_produces_no_rows() {
        let mut text = String::from("Name,Email,Role\n");
        for i in 0..101 {
            text.push_str(&format!("User {i},u{i}@x.com,Admin\n"));
        }
        let mut flow = ImportFlow::new();
        let err = flow
            .accept_upload(&csv_file(&text), &directory(), &ImportConfig::default(), now())
            .unwrap_err();
        assert!(err.to_string().contains("Maximum 100 users allowed per import"));
        assert_eq!(flow.step(), ImportStep::Upload);
        assert!(flow.rows().is_empty());
    }

    #[test]
    fn discard_returns_to_upload() {
        let mut flow = previewing();
        flow.discard_upload().unwrap();
        assert_eq!(flow.step(), ImportStep::Upload);
        assert!(flow.rows().is_empty());
        assert!(flow.discard_upload().is_err());
    }

    #[test]
    fn start_requires_a_selection() {
        let mut flow = previewing();
        flow.grid_mut().unwrap().deselect_all();
        let err = flow.start_import("admin".into(), now()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(flow.step(), ImportStep::Preview);
    }

    #[test]
    fn start_builds_batch_from_selection_and_full_counts() {
        let mut flow = previewing();
        let batch_id = flow.upload().unwrap().batch_id.clone();
        let batch = flow.start_import("admin@example.com".into(), now()).unwrap();
        assert_eq!(batch.batch_id, batch_id);
        assert_eq!(batch.status, BatchStatus::Processing);
        assert_eq!(batch.total_rows, 2);
        assert_eq!(batch.ignore_count, 1);
        assert_eq!(batch.error_count, 1);
        assert_eq!(batch.progress, 0);
        assert!(!batch.can_rollback);
        assert_eq!(flow.step(), ImportStep::Processing);
    }

    #[test]
    fn grid_is_read_only_while_processing() {
        let mut flow = previewing();
        flow.start_import("admin".into(), now()).unwrap();
        assert!(matches!(flow.grid_mut(), Err(CoreError::Conflict(_))));
    }

    #[test]
    fn processing_completes_after_last_row() {
        let config = ImportConfig::default();
        let mut flow = previewing();
        flow.start_import("admin".into(), now()).unwrap();

        let batch = flow.record_row_processed(&config).unwrap();
        assert_eq!(batch.processed_rows, 1);
        assert_eq!(batch.progress, 50);
        assert_eq!(flow.step(), ImportStep::Processing);

        let batch = flow.record_row_processed(&config).unwrap();
        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(batch.progress, 100);
        assert!(batch.can_rollback);
        assert_eq!(
            batch.rollback_deadline,
            Some(now() + chrono::Duration::minutes(30))
        );
        assert_eq!(flow.step(), ImportStep::Complete);
        assert!(flow.record_row_processed(&config).is_err());
    }

    #[test]
    fn rollback_resets_to_upload() {
        let config = ImportConfig::default();
        let mut flow = previewing();
        flow.start_import("admin".into(), now()).unwrap();
        flow.record_row_processed(&config).unwrap();
        flow.record_row_processed(&config).unwrap();

        let target = flow.rollback_target(now()).unwrap().to_string();
        let batch = flow.finish_rollback().unwrap();
        assert_eq!(batch.batch_id, target);
        assert!(!batch.can_rollback);
        assert_eq!(flow.step(), ImportStep::Upload);
        assert!(flow.rows().is_empty());
        assert!(flow.batch().is_none());
    }

    #[test]
    fn rollback_after_deadline_is_refused() {
        let config = ImportConfig::default();
        let mut flow = previewing();
        flow.start_import("admin".into(), now()).unwrap();
        flow.record_row_processed(&config).unwrap();
        flow.record_row_processed(&config).unwrap();

        let late = now() + chrono::Duration::minutes(31);
        let err = flow.rollback_target(late).unwrap_err();
        assert!(err.to_string().contains("Rollback window has expired"));
        assert_eq!(flow.step(), ImportStep::Complete);
    }

    #[test]
    fn rollback_is_refused_before_completion() {
        let mut flow = previewing();
        flow.start_import("admin".into(), now()).unwrap();
        assert!(flow.rollback_target(now()).is_err());
        assert!(flow.finish_rollback().is_err());
    }

    #[test]
    fn failed_batch_cannot_be_rolled_back_but_can_start_over() {
        let config = ImportConfig::default();
        let mut flow = previewing();
        flow.start_import("admin".into(), now()).unwrap();
        flow.record_row_processed(&config).unwrap();

        let batch = flow.fail("store unavailable".into()).unwrap();
        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(batch.processed_rows, 1);
        assert_eq!(flow.step(), ImportStep::Complete);
        assert!(flow.rollback_target(now()).is_err());

        flow.start_over().unwrap();
        assert_eq!(flow.step(), ImportStep::Upload);
    }

    #[test]
    fn error_log_available_from_preview_on() {
        assert!(ImportFlow::new().error_log_csv().is_err());

        let mut flow = previewing();
        assert!(flow.error_log_csv().unwrap().contains("Jane,bademail"));
        flow.start_import("admin".into(), now()).unwrap();
        assert!(flow.error_log_csv().unwrap().contains("Jane,bademail"));
    }

    #[test]
    fn second_upload_requires_discarding_first() {
        let mut flow = previewing();
        let err = flow
            .accept_upload(&csv_file(MIXED), &directory(), &ImportConfig::default(), now())
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }
}
