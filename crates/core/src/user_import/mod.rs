//! Bulk user import from CSV.
//!
//! - [`gate`]: size and type checks on the uploaded file.
//! - [`parser`]: CSV text to raw rows.
//! - [`validator`]: per-row classification into success / ignore / error.
//! - [`preview`]: selection, inline edits, and counts over the rows.
//! - [`flow`]: the upload → preview → processing → complete state machine.
//! - [`batch`]: progress and rollback bookkeeping of a running import.
//! - [`export`]: template and error-log CSV downloads.
//! - [`directory`]: the existing-user lookup the validator consults.

pub mod batch;
pub mod directory;
pub mod export;
pub mod flow;
pub mod gate;
pub mod parser;
pub mod preview;
pub mod row;
pub mod validator;

pub use batch::{BatchStatus, ImportBatch};
pub use directory::{KnownEmails, UserDirectory};
pub use flow::{ImportFlow, ImportStep, ValidatedUpload};
pub use gate::UploadedFile;
pub use preview::{PreviewGrid, RowCounts, RowEdit};
pub use row::{RawRow, RowField, UploadRow, ValidationIssue, ValidationStatus};
