//! Preview grid: row selection, inline edits, and running counts.
//!
//! Counts are never stored; they are recomputed from the rows on every call
//! so they cannot drift after an edit.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

use super::directory::UserDirectory;
use super::row::{UploadRow, ValidationStatus};
use super::validator::revalidate_edit;

/// Classification and selection totals for the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCounts {
    pub total: usize,
    pub success: usize,
    pub ignore: usize,
    pub error: usize,
    pub selected: usize,
}

/// Inline edit of the identity fields of one row. `None` leaves a field
/// untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RowEdit {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl RowEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none()
    }
}

/// The rows of one upload as the operator reviews them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewGrid {
    rows: Vec<UploadRow>,
}

impl PreviewGrid {
    pub fn new(rows: Vec<UploadRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[UploadRow] {
        &self.rows
    }

    pub fn row(&self, row_number: usize) -> Result<&UploadRow, CoreError> {
        self.rows
            .iter()
            .find(|r| r.row_number == row_number)
            .ok_or_else(|| row_not_found(row_number))
    }

    fn row_mut(&mut self, row_number: usize) -> Result<&mut UploadRow, CoreError> {
        self.rows
            .iter_mut()
            .find(|r| r.row_number == row_number)
            .ok_or_else(|| row_not_found(row_number))
    }

    /// Flip the selection of a `Success` row. Other rows are left alone.
    ///
    /// Returns the row's selection state after the call.
    pub fn toggle_selection(&mut self, row_number: usize) -> Result<bool, CoreError> {
        let row = self.row_mut(row_number)?;
        if row.is_success() {
            row.is_selected = !row.is_selected;
        }
        Ok(row.is_selected)
    }

    /// Select every `Success` row.
    pub fn select_all_valid(&mut self) {
        for row in self.rows.iter_mut().filter(|r| r.is_success()) {
            row.is_selected = true;
        }
    }

    pub fn deselect_all(&mut self) {
        for row in &mut self.rows {
            row.is_selected = false;
        }
    }

    pub fn begin_edit(&mut self, row_number: usize) -> Result<(), CoreError> {
        self.row_mut(row_number)?.is_editing = true;
        Ok(())
    }

    pub fn cancel_edit(&mut self, row_number: usize) -> Result<(), CoreError> {
        self.row_mut(row_number)?.is_editing = false;
        Ok(())
    }

    /// The email a row will carry once `edit` is applied, trimmed.
    ///
    /// This is what the existing-user lookup must be run against, whether or
    /// not the edit touches the email.
    pub fn edited_email(&self, row_number: usize, edit: &RowEdit) -> Result<String, CoreError> {
        let email = match &edit.email {
            Some(email) => email,
            None => &self.row(row_number)?.email,
        };
        Ok(email.trim().to_string())
    }

    /// Apply an inline edit and revalidate that row on its own.
    pub fn apply_edit(
        &mut self,
        row_number: usize,
        edit: RowEdit,
        directory: &dyn UserDirectory,
    ) -> Result<&UploadRow, CoreError> {
        if edit.is_empty() {
            return Err(CoreError::Validation(
                "An edit must change at least one of name, email, or role".to_string(),
            ));
        }
        let row = self.row_mut(row_number)?;
        if let Some(name) = edit.name {
            row.name = name.trim().to_string();
        }
        if let Some(email) = edit.email {
            row.email = email.trim().to_string();
        }
        if let Some(role) = edit.role {
            row.role = role.trim().to_string();
        }
        revalidate_edit(row, directory);
        row.is_editing = false;
        Ok(row)
    }

    pub fn counts(&self) -> RowCounts {
        let count = |status: ValidationStatus| {
            self.rows
                .iter()
                .filter(|r| r.validation_status == status)
                .count()
        };
        RowCounts {
            total: self.rows.len(),
            success: count(ValidationStatus::Success),
            ignore: count(ValidationStatus::Ignore),
            error: count(ValidationStatus::Error),
            selected: self.rows.iter().filter(|r| r.is_selected).count(),
        }
    }

    /// Rows that will be sent to the user store, in file order.
    pub fn selected_rows(&self) -> Vec<UploadRow> {
        self.rows.iter().filter(|r| r.is_selected).cloned().collect()
    }
}

fn row_not_found(row_number: usize) -> CoreError {
    CoreError::NotFound {
        entity: "UploadRow",
        id: row_number.to_string(),
    }
}
