//! Downloadable CSV artifacts: the blank template and the error log.

use crate::error::CoreError;

use super::row::{UploadRow, ValidationStatus};

/// Suggested file name for the template download.
pub const TEMPLATE_FILE_NAME: &str = "user_import_template.csv";

/// Suggested file name for the error log download.
pub const ERROR_LOG_FILE_NAME: &str = "user_import_errors.csv";

/// Column headers of the error log.
pub const ERROR_LOG_HEADER: [&str; 5] = ["Row", "Name", "Email", "Role", "Error Reason"];

/// Separator between multiple messages of one row in the error log.
pub const ERROR_SEPARATOR: &str = "; ";

const TEMPLATE_CSV: &str = "\
Name,Email,Phone,Date of Birth,Role
John Doe,john.doe@example.com,+1 555 010 2000,15-04-1988,Creator
Jane Smith,jane.smith@example.com,+1 555 010 2001,1990-09-23,Reviewer
Ravi Kumar,ravi.kumar@example.com,,,Translator
Maria Garcia,maria.garcia@example.com,+1 555 010 2003,02-11-1985,Admin
";

/// The blank template offered to operators before they upload.
pub fn template_csv() -> &'static str {
    TEMPLATE_CSV
}

/// Serialize every `Error` row to CSV. Other rows are skipped.
pub fn error_log_csv(rows: &[UploadRow]) -> Result<String, CoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(ERROR_LOG_HEADER).map_err(csv_error)?;

    for row in rows
        .iter()
        .filter(|r| r.validation_status == ValidationStatus::Error)
    {
        let row_number = row.row_number.to_string();
        let reasons = row.errors.join(ERROR_SEPARATOR);
        writer
            .write_record([
                row_number.as_str(),
                row.name.as_str(),
                row.email.as_str(),
                row.role.as_str(),
                reasons.as_str(),
            ])
            .map_err(csv_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CoreError::Internal(format!("Failed to flush error log: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| CoreError::Internal(format!("Error log is not valid UTF-8: {e}")))
}

fn csv_error(e: csv::Error) -> CoreError {
    CoreError::Internal(format!("Failed to write error log: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_USERS_PER_IMPORT;
    use crate::user_import::directory::KnownEmails;
    use crate::user_import::parser::parse_rows;
    use crate::user_import::validator::validate_rows;

    fn rows_from(text: &str) -> Vec<UploadRow> {
        let raw = parse_rows(text, MAX_USERS_PER_IMPORT).unwrap();
        validate_rows(raw, &KnownEmails::new()).0
    }

    #[test]
    fn error_log_contains_only_error_rows() {
        let rows = rows_from(
            "Name,Email,Role\n\
             Ann,ann@x.com,Admin\n\
             Bob,bad,Nope\n",
        );
        let log = error_log_csv(&rows).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines[0], "Row,Name,Email,Role,Error Reason");
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("3,Bob,bad,Nope,"));
        assert!(lines[1].contains("Invalid email format; Invalid role: Nope"));
    }

    #[test]
    fn error_log_quotes_fields_with_commas() {
        let rows = rows_from("Name,Email,Role\nBob,bob@x.com,Nope\n");
        let log = error_log_csv(&rows).unwrap();
        // The role message lists the whitelist, which contains commas.
        assert!(log.contains("\"Invalid role: Nope. Must be one of: Admin, Creator"));
    }

    #[test]
    fn error_log_with_no_errors_is_header_only() {
        let rows = rows_from("Name,Email,Role\nAnn,ann@x.com,Admin\n");
        assert_eq!(error_log_csv(&rows).unwrap(), "Row,Name,Email,Role,Error Reason\n");
    }

    #[test]
    fn template_parses_into_four_valid_rows() {
        let rows = rows_from(template_csv());
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.is_success()));
        assert!(rows.iter().all(|r| r.errors.is_empty()));
    }
}
