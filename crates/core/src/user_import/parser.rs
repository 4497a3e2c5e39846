//! CSV row parser for the bulk user import.
//!
//! Turns decoded CSV text into [`RawRow`]s. Column names are matched
//! case-insensitively, a few aliases are accepted, and unknown columns are
//! ignored. The only way a parse fails is a structurally unusable file or a
//! file with more rows than a single import allows; row-level problems are
//! left to the validator.

use std::collections::HashMap;

use crate::error::CoreError;

use super::row::RawRow;

/// Header keys (lower-cased) accepted for each field, in lookup order.
pub const NAME_KEYS: &[&str] = &["name"];
pub const EMAIL_KEYS: &[&str] = &["email"];
pub const PHONE_KEYS: &[&str] = &["phone", "phone number"];
pub const DATE_OF_BIRTH_KEYS: &[&str] = &["dob", "date of birth", "dateofbirth"];
pub const ROLE_KEYS: &[&str] = &["role"];

/// Parse CSV text into raw rows.
///
/// Blank lines are dropped before numbering. The header is line 1, so the
/// first data row carries `row_number == 2`.
pub fn parse_rows(text: &str, max_rows: usize) -> Result<Vec<RawRow>, CoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut records: Vec<Vec<String>> = Vec::new();
    for result in reader.records() {
        let record = result
            .map_err(|e| CoreError::Validation(format!("Malformed CSV file: {e}")))?;
        let cells: Vec<String> = record.iter().map(clean_cell).collect();
        if is_blank(&cells) {
            continue;
        }
        records.push(cells);
    }

    let mut lines = records.into_iter();
    let header: Vec<String> = lines
        .next()
        .ok_or_else(|| CoreError::Validation("The CSV file is empty".to_string()))?
        .into_iter()
        .map(|key| key.to_lowercase())
        .collect();

    let data: Vec<Vec<String>> = lines.collect();
    if data.is_empty() {
        return Err(CoreError::Validation(
            "The CSV file contains no user rows".to_string(),
        ));
    }
    if data.len() > max_rows {
        return Err(CoreError::Validation(format!(
            "Maximum {max_rows} users allowed per import. Your file contains {} rows.",
            data.len()
        )));
    }

    Ok(data
        .into_iter()
        .enumerate()
        .map(|(idx, cells)| to_raw_row(idx + 2, &header, cells))
        .collect())
}

// ── Private helpers ──────────────────────────────────────────────────

fn clean_cell(cell: &str) -> String {
    cell.trim().replace('"', "")
}

fn is_blank(cells: &[String]) -> bool {
    cells.len() <= 1 && cells.iter().all(|c| c.is_empty())
}

fn to_raw_row(row_number: usize, header: &[String], cells: Vec<String>) -> RawRow {
    let fields: HashMap<&str, String> = header
        .iter()
        .map(String::as_str)
        .zip(cells)
        .collect();

    RawRow {
        row_number,
        name: lookup(&fields, NAME_KEYS),
        email: lookup(&fields, EMAIL_KEYS),
        phone: lookup(&fields, PHONE_KEYS),
        date_of_birth: lookup(&fields, DATE_OF_BIRTH_KEYS),
        role: lookup(&fields, ROLE_KEYS),
    }
}

/// First non-empty value among the given keys, or an empty string.
fn lookup(fields: &HashMap<&str, String>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| fields.get(key))
        .find(|value| !value.is_empty())
        .cloned()
        .unwrap_or_default()
}
