//! Tunable limits for the bulk user import.

use std::time::Duration;

/// Default maximum number of data rows accepted in one CSV file.
pub const MAX_USERS_PER_IMPORT: usize = 100;

/// Default maximum upload size in megabytes.
pub const MAX_FILE_SIZE_MB: u64 = 2;

/// Default rollback window after a completed import, in minutes.
pub const ROLLBACK_WINDOW_MINUTES: i64 = 30;

/// Default simulated per-row processing delay, in milliseconds.
pub const ROW_DELAY_MS: u64 = 100;

/// Limits applied by the upload gate, the parser, and the processing loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Ceiling on data rows per file. Larger files are rejected outright.
    pub max_users_per_import: usize,
    /// Ceiling on the raw upload size, in bytes.
    pub max_file_size_bytes: u64,
    /// How long after completion a batch may still be rolled back.
    pub rollback_window: chrono::Duration,
    /// Pause before each row is handed to the user store.
    pub row_delay: Duration,
}

impl ImportConfig {
    /// Size limit in whole megabytes, for messages.
    pub fn max_file_size_mb(&self) -> u64 {
        self.max_file_size_bytes / (1024 * 1024)
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_users_per_import: MAX_USERS_PER_IMPORT,
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            rollback_window: chrono::Duration::minutes(ROLLBACK_WINDOW_MINUTES),
            row_delay: Duration::from_millis(ROW_DELAY_MS),
        }
    }
}
