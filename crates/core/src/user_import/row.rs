//! Row-level types shared by the parser, validator, and preview grid.

use serde::{Deserialize, Serialize};

/// Reason attached to a row that passed every rule.
pub const REASON_NEW_USER: &str = "New user to be created";

/// Classification of one uploaded row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// A new user will be created.
    Success,
    /// The email already belongs to a user; the row is skipped.
    Ignore,
    /// At least one blocking rule failed.
    Error,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Ignore => "ignore",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The CSV columns the import understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowField {
    Name,
    Email,
    Phone,
    DateOfBirth,
    Role,
}

/// Fields extracted from one CSV data line, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based file line number (the header is line 1).
    pub row_number: usize,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub role: String,
}

/// One validated row as shown in the preview grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRow {
    /// 1-based file line number; also the row's identifier in the grid.
    pub row_number: usize,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub role: String,
    pub validation_status: ValidationStatus,
    pub status_reason: String,
    /// Every validation message, in rule order.
    pub errors: Vec<String>,
    /// Only ever `true` for `Success` rows.
    pub is_selected: bool,
    /// Transient inline-edit flag; not part of the imported batch.
    #[serde(default)]
    pub is_editing: bool,
}

impl UploadRow {
    pub fn is_success(&self) -> bool {
        self.validation_status == ValidationStatus::Success
    }
}

/// One entry of the flat validation report returned with a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub row: usize,
    pub field: RowField,
    pub message: String,
}
