//! Row validation rules for the bulk user import.
//!
//! Rules run in a fixed order. Every triggered message is kept in the row's
//! `errors`; the last blocking rule to fire sets the `status_reason`. A row
//! whose email belongs to an existing user is `Ignore` and stays `Ignore`:
//! later rules may add messages but never turn it into an `Error`. Date of
//! birth and phone are advisory and never change the status.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::roles::Role;

use super::directory::UserDirectory;
use super::row::{RawRow, RowField, UploadRow, ValidationIssue, ValidationStatus, REASON_NEW_USER};

/// Minimum length of a display name, in characters.
pub const MIN_NAME_CHARS: usize = 2;

pub const REASON_MISSING_NAME: &str = "Missing required field: Name";
pub const REASON_MISSING_EMAIL: &str = "Missing required field: Email";
pub const REASON_INVALID_EMAIL: &str = "Invalid email format";
pub const REASON_DUPLICATE_EMAIL: &str = "Duplicate email in CSV";
pub const REASON_MISSING_ROLE: &str = "Missing required field: Role";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));
static DOB_DAY_FIRST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}-\d{2}-\d{4}$").expect("valid regex"));
static DOB_YEAR_FIRST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[\d\s\-()]+$").expect("valid regex"));

/// Basic `local@domain.tld` shape check.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// `DD-MM-YYYY` or `YYYY-MM-DD`. Shape only; no calendar check.
pub fn is_valid_date_of_birth(dob: &str) -> bool {
    DOB_DAY_FIRST_RE.is_match(dob) || DOB_YEAR_FIRST_RE.is_match(dob)
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

/// Validate every parsed row of one upload.
///
/// Returns the preview rows plus a flat issue list with one entry per
/// message.
pub fn validate_rows(
    rows: Vec<RawRow>,
    directory: &dyn UserDirectory,
) -> (Vec<UploadRow>, Vec<ValidationIssue>) {
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut validated = Vec::with_capacity(rows.len());
    let mut issues = Vec::new();

    for raw in rows {
        let mut verdict = Verdict::new();

        check_name(&mut verdict, &raw.name);
        if let EmailCheck::Fresh(key) = check_email(&mut verdict, &raw.email, directory) {
            match first_seen.get(&key) {
                Some(first_row) => verdict.block(
                    RowField::Email,
                    REASON_DUPLICATE_EMAIL.to_string(),
                    format!("{REASON_DUPLICATE_EMAIL} (first seen in row {first_row})"),
                ),
                None => {
                    first_seen.insert(key, raw.row_number);
                }
            }
        }
        check_role(&mut verdict, &raw.role);
        check_date_of_birth(&mut verdict, &raw.date_of_birth);
        check_phone(&mut verdict, &raw.phone);

        issues.extend(verdict.issues(raw.row_number));
        validated.push(verdict.into_row(raw));
    }

    (validated, issues)
}

/// Re-run the identity rules (name, email, role) on an edited row.
///
/// The row is checked in isolation: duplicates elsewhere in the same file
/// are not detected, and advisory date/phone messages are dropped.
pub fn revalidate_edit(row: &mut UploadRow, directory: &dyn UserDirectory) {
    let mut verdict = Verdict::new();
    check_name(&mut verdict, &row.name);
    check_email(&mut verdict, &row.email, directory);
    check_role(&mut verdict, &row.role);
    verdict.apply_to(row);
}

// ── Rule accumulator ─────────────────────────────────────────────────

struct Verdict {
    status: ValidationStatus,
    reason: String,
    messages: Vec<(RowField, String)>,
}

impl Verdict {
    fn new() -> Self {
        Self {
            status: ValidationStatus::Success,
            reason: REASON_NEW_USER.to_string(),
            messages: Vec::new(),
        }
    }

    /// A blocking failure: records the message and, unless the row is
    /// already ignored, marks it as an error with this reason.
    fn block(&mut self, field: RowField, reason: String, message: String) {
        self.messages.push((field, message));
        if self.status != ValidationStatus::Ignore {
            self.status = ValidationStatus::Error;
            self.reason = reason;
        }
    }

    /// An advisory failure: message only.
    fn note(&mut self, field: RowField, message: &str) {
        self.messages.push((field, message.to_string()));
    }

    fn ignore(&mut self, reason: String) {
        self.status = ValidationStatus::Ignore;
        self.reason = reason;
    }

    fn issues(&self, row: usize) -> impl Iterator<Item = ValidationIssue> + '_ {
        self.messages.iter().map(move |(field, message)| ValidationIssue {
            row,
            field: *field,
            message: message.clone(),
        })
    }

    fn into_row(self, raw: RawRow) -> UploadRow {
        UploadRow {
            row_number: raw.row_number,
            name: raw.name,
            email: raw.email,
            phone: raw.phone,
            date_of_birth: raw.date_of_birth,
            role: raw.role,
            is_selected: self.status == ValidationStatus::Success,
            validation_status: self.status,
            status_reason: self.reason,
            errors: self.messages.into_iter().map(|(_, m)| m).collect(),
            is_editing: false,
        }
    }

    fn apply_to(self, row: &mut UploadRow) {
        row.is_selected = self.status == ValidationStatus::Success;
        row.validation_status = self.status;
        row.status_reason = self.reason;
        row.errors = self.messages.into_iter().map(|(_, m)| m).collect();
    }
}

// ── Rules ────────────────────────────────────────────────────────────

enum EmailCheck {
    Missing,
    Malformed,
    Existing,
    /// Well-formed and unknown to the directory; carries the lower-cased key.
    Fresh(String),
}

fn check_name(verdict: &mut Verdict, name: &str) {
    if name.trim().chars().count() < MIN_NAME_CHARS {
        verdict.block(
            RowField::Name,
            REASON_MISSING_NAME.to_string(),
            format!("Name is required (minimum {MIN_NAME_CHARS} characters)"),
        );
    }
}

fn check_email(verdict: &mut Verdict, email: &str, directory: &dyn UserDirectory) -> EmailCheck {
    let email = email.trim();
    if email.is_empty() {
        verdict.block(
            RowField::Email,
            REASON_MISSING_EMAIL.to_string(),
            "Email is required".to_string(),
        );
        return EmailCheck::Missing;
    }
    if !is_valid_email(email) {
        verdict.block(
            RowField::Email,
            REASON_INVALID_EMAIL.to_string(),
            REASON_INVALID_EMAIL.to_string(),
        );
        return EmailCheck::Malformed;
    }
    if directory.contains_email(email) {
        verdict.ignore(format!("User with email {email} already exists"));
        return EmailCheck::Existing;
    }
    EmailCheck::Fresh(email.to_lowercase())
}

fn check_role(verdict: &mut Verdict, role: &str) {
    let role = role.trim();
    if role.is_empty() {
        verdict.block(
            RowField::Role,
            REASON_MISSING_ROLE.to_string(),
            "Role is required".to_string(),
        );
    } else if Role::parse(role).is_none() {
        verdict.block(
            RowField::Role,
            format!("Invalid role: {role}"),
            format!("Invalid role: {role}. Must be one of: {}", Role::whitelist()),
        );
    }
}

fn check_date_of_birth(verdict: &mut Verdict, dob: &str) {
    if !dob.is_empty() && !is_valid_date_of_birth(dob) {
        verdict.note(
            RowField::DateOfBirth,
            "Invalid date format (use DD-MM-YYYY or YYYY-MM-DD)",
        );
    }
}

fn check_phone(verdict: &mut Verdict, phone: &str) {
    if !phone.is_empty() && !is_valid_phone(phone) {
        verdict.note(RowField::Phone, "Invalid phone number format");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_import::directory::KnownEmails;

    fn raw(row_number: usize, name: &str, email: &str, role: &str) -> RawRow {
        RawRow {
            row_number,
            name: name.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            ..Default::default()
        }
    }

    fn existing() -> KnownEmails {
        ["existing@example.com"].into_iter().collect()
    }

    fn validate_one(row: RawRow) -> UploadRow {
        let (mut rows, _) = validate_rows(vec![row], &existing());
        rows.remove(0)
    }

    #[test]
    fn valid_row_is_success_and_selected() {
        let row = validate_one(raw(2, "John", "john@x.com", "Creator"));
        assert_eq!(row.validation_status, ValidationStatus::Success);
        assert_eq!(row.status_reason, REASON_NEW_USER);
        assert!(row.is_selected);
        assert!(row.errors.is_empty());
    }

    #[test]
    fn mixed_file_classifies_each_row() {
        let (rows, issues) = validate_rows(
            vec![
                raw(2, "John", "john@x.com", "Creator"),
                raw(3, "Jane", "bademail", "Admin"),
            ],
            &existing(),
        );
        assert_eq!(rows[0].validation_status, ValidationStatus::Success);
        assert_eq!(rows[1].validation_status, ValidationStatus::Error);
        assert_eq!(rows[1].status_reason, "Invalid email format");
        assert!(rows[1].errors.contains(&"Invalid email format".to_string()));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].row, 3);
        assert_eq!(issues[0].field, RowField::Email);
    }

    #[test]
    fn existing_user_is_ignored() {
        let row = validate_one(raw(2, "Old Timer", "existing@example.com", "Admin"));
        assert_eq!(row.validation_status, ValidationStatus::Ignore);
        assert_eq!(
            row.status_reason,
            "User with email existing@example.com already exists"
        );
        assert!(!row.is_selected);
    }

    #[test]
    fn existing_user_stays_ignored_despite_other_failures() {
        let row = validate_one(raw(2, "X", "EXISTING@example.com", "Janitor"));
        assert_eq!(row.validation_status, ValidationStatus::Ignore);
        // Messages from the failing name and role rules are still recorded.
        assert_eq!(row.errors.len(), 2);
    }

    #[test]
    fn short_or_missing_name_is_error() {
        for name in ["", "J", " J "] {
            let row = validate_one(raw(2, name, "j@x.com", "Admin"));
            assert_eq!(row.validation_status, ValidationStatus::Error, "name: {name:?}");
            assert_eq!(row.status_reason, REASON_MISSING_NAME);
        }
    }

    #[test]
    fn missing_email_is_error() {
        let row = validate_one(raw(2, "John", "", "Admin"));
        assert_eq!(row.validation_status, ValidationStatus::Error);
        assert_eq!(row.status_reason, REASON_MISSING_EMAIL);
    }

    #[test]
    fn invalid_and_missing_roles_are_errors() {
        let row = validate_one(raw(2, "John", "j@x.com", "Janitor"));
        assert_eq!(row.validation_status, ValidationStatus::Error);
        assert_eq!(row.status_reason, "Invalid role: Janitor");
        assert!(row.errors[0].contains("Must be one of: Admin, Creator"));

        let row = validate_one(raw(2, "John", "j@x.com", ""));
        assert_eq!(row.status_reason, REASON_MISSING_ROLE);

        let row = validate_one(raw(2, "John", "j@x.com", "admin"));
        assert_eq!(row.validation_status, ValidationStatus::Error);
    }

    #[test]
    fn last_blocking_rule_sets_reason_and_all_messages_accumulate() {
        let row = validate_one(raw(2, "", "bad", "Nope"));
        assert_eq!(row.validation_status, ValidationStatus::Error);
        assert_eq!(row.status_reason, "Invalid role: Nope");
        assert_eq!(row.errors.len(), 3);
        assert!(row.errors[0].starts_with("Name is required"));
        assert_eq!(row.errors[1], "Invalid email format");
    }

    #[test]
    fn duplicates_after_first_occurrence_are_errors() {
        let (rows, _) = validate_rows(
            vec![
                raw(2, "Ann", "ann@x.com", "Admin"),
                raw(3, "Ann Two", "ANN@x.com", "Creator"),
                raw(4, "Ann Three", "ann@X.COM", "Creator"),
            ],
            &existing(),
        );
        assert_eq!(rows[0].validation_status, ValidationStatus::Success);
        for dup in &rows[1..] {
            assert_eq!(dup.validation_status, ValidationStatus::Error);
            assert_eq!(dup.status_reason, REASON_DUPLICATE_EMAIL);
            assert_eq!(dup.errors, vec!["Duplicate email in CSV (first seen in row 2)"]);
        }
    }

    #[test]
    fn first_occurrence_is_classified_independently() {
        let (rows, _) = validate_rows(
            vec![
                raw(2, "A", "ann@x.com", "Admin"),
                raw(3, "Ann", "ann@x.com", "Admin"),
            ],
            &existing(),
        );
        assert_eq!(rows[0].status_reason, REASON_MISSING_NAME);
        assert_eq!(rows[1].status_reason, REASON_DUPLICATE_EMAIL);
    }

    #[test]
    fn duplicated_existing_users_are_all_ignored() {
        let (rows, _) = validate_rows(
            vec![
                raw(2, "Old", "existing@example.com", "Admin"),
                raw(3, "Old", "Existing@Example.com", "Admin"),
            ],
            &existing(),
        );
        assert!(rows
            .iter()
            .all(|r| r.validation_status == ValidationStatus::Ignore));
    }

    #[test]
    fn bad_date_and_phone_only_add_messages() {
        let mut row = raw(2, "John", "j@x.com", "Admin");
        row.date_of_birth = "1990/01/01".into();
        row.phone = "call me".into();
        let row = validate_one(row);
        assert_eq!(row.validation_status, ValidationStatus::Success);
        assert!(row.is_selected);
        assert_eq!(row.errors.len(), 2);
    }

    #[test]
    fn date_and_phone_shapes() {
        assert!(is_valid_date_of_birth("31-12-1999"));
        assert!(is_valid_date_of_birth("1999-12-31"));
        // Shape only: no calendar validation.
        assert!(is_valid_date_of_birth("99-99-9999"));
        assert!(!is_valid_date_of_birth("1999-1-31"));
        assert!(is_valid_phone("+44 (20) 7946-0958"));
        assert!(!is_valid_phone("555-CALL"));
    }

    #[test]
    fn revalidate_fixes_an_edited_row() {
        let mut row = validate_one(raw(2, "Jane", "bademail", "Admin"));
        assert_eq!(row.validation_status, ValidationStatus::Error);

        row.email = "jane@x.com".into();
        revalidate_edit(&mut row, &existing());
        assert_eq!(row.validation_status, ValidationStatus::Success);
        assert!(row.is_selected);
        assert!(row.errors.is_empty());
    }

    #[test]
    fn revalidate_detects_existing_user() {
        let mut row = validate_one(raw(2, "Jane", "jane@x.com", "Admin"));
        row.email = "existing@example.com".into();
        revalidate_edit(&mut row, &existing());
        assert_eq!(row.validation_status, ValidationStatus::Ignore);
        assert!(!row.is_selected);
    }

    #[test]
    fn revalidate_does_not_recheck_in_file_duplicates() {
        // Known limitation: an edit can introduce a duplicate that goes
        // unnoticed until the backend rejects it.
        let (mut rows, _) = validate_rows(
            vec![
                raw(2, "Ann", "ann@x.com", "Admin"),
                raw(3, "Bob", "bob@x.com", "Admin"),
            ],
            &existing(),
        );
        rows[1].email = "ann@x.com".into();
        revalidate_edit(&mut rows[1], &existing());
        assert_eq!(rows[1].validation_status, ValidationStatus::Success);
    }
}
