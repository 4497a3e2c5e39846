//! Upload gate: the size and type checks a file must pass before any of
//! its content is read.

use serde::{Deserialize, Serialize};

use crate::config::ImportConfig;
use crate::error::CoreError;

/// MIME type accepted in place of a `.csv` extension.
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Extension accepted in place of the CSV MIME type.
pub const CSV_EXTENSION: &str = ".csv";

const UTF8_BOM: char = '\u{feff}';

/// A file as received from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub file_name: String,
    /// MIME type reported by the client, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Returns `true` if either the MIME type or the file extension says CSV.
pub fn is_csv_file(file_name: &str, content_type: Option<&str>) -> bool {
    let mime_ok = content_type
        .map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .eq_ignore_ascii_case(CSV_CONTENT_TYPE)
        })
        .unwrap_or(false);
    mime_ok || file_name.to_ascii_lowercase().ends_with(CSV_EXTENSION)
}

/// Check an upload against the gate and decode it as UTF-8 text.
///
/// The size check runs first so an oversized file is never decoded.
pub fn check_upload(file: &UploadedFile, config: &ImportConfig) -> Result<String, CoreError> {
    if file.bytes.len() as u64 > config.max_file_size_bytes {
        return Err(CoreError::Validation(format!(
            "File size exceeds the {} MB limit",
            config.max_file_size_mb()
        )));
    }

    if !is_csv_file(&file.file_name, file.content_type.as_deref()) {
        return Err(CoreError::Validation(
            "Only CSV files are accepted".to_string(),
        ));
    }

    let text = std::str::from_utf8(&file.bytes).map_err(|e| {
        CoreError::Validation(format!("The CSV file is not valid UTF-8 text: {e}"))
    })?;

    Ok(text.strip_prefix(UTF8_BOM).unwrap_or(text).to_string())
}
