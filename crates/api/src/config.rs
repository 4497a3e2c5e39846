use std::str::FromStr;
use std::time::Duration;

use examdesk_core::config::{
    ImportConfig, MAX_FILE_SIZE_MB, MAX_USERS_PER_IMPORT, ROLLBACK_WINDOW_MINUTES, ROW_DELAY_MS,
};

/// Which [`UserStore`](crate::user_store::UserStore) backs the import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStoreKind {
    /// Users are written to PostgreSQL.
    Postgres,
    /// Users live in process memory; nothing survives a restart.
    Memory,
}

impl FromStr for UserStoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown user store '{other}' (expected postgres or memory)")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for running imports to finish (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Limits for uploads, parsing, processing, and rollback.
    pub import: ImportConfig,
    /// Backing store for created users (default: `postgres`).
    pub user_store: UserStoreKind,
    /// Emails that already exist when the memory store starts.
    pub seed_existing_emails: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                    |
    /// |--------------------------|----------------------------|
    /// | `HOST`                   | `0.0.0.0`                  |
    /// | `PORT`                   | `3000`                     |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                       |
    /// | `MAX_USERS_PER_IMPORT`   | `100`                      |
    /// | `MAX_FILE_SIZE_MB`       | `2`                        |
    /// | `ROLLBACK_WINDOW_MINUTES`| `30`                       |
    /// | `IMPORT_ROW_DELAY_MS`    | `100`                      |
    /// | `USER_STORE`             | `postgres`                 |
    /// | `SEED_EXISTING_EMAILS`   | `existing@example.com`     |
    ///
    /// Panics on malformed values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_parse("PORT", "3000");

        let cors_origins = env_list("CORS_ORIGINS", "http://localhost:5173");

        let request_timeout_secs: u64 = env_parse("REQUEST_TIMEOUT_SECS", "30");
        let shutdown_timeout_secs: u64 = env_parse("SHUTDOWN_TIMEOUT_SECS", "30");

        let max_file_size_mb: u64 = env_parse("MAX_FILE_SIZE_MB", &MAX_FILE_SIZE_MB.to_string());
        let rollback_minutes: i64 = env_parse(
            "ROLLBACK_WINDOW_MINUTES",
            &ROLLBACK_WINDOW_MINUTES.to_string(),
        );
        let row_delay_ms: u64 = env_parse("IMPORT_ROW_DELAY_MS", &ROW_DELAY_MS.to_string());

        let import = ImportConfig {
            max_users_per_import: env_parse(
                "MAX_USERS_PER_IMPORT",
                &MAX_USERS_PER_IMPORT.to_string(),
            ),
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            rollback_window: chrono::Duration::minutes(rollback_minutes),
            row_delay: Duration::from_millis(row_delay_ms),
        };

        let user_store: UserStoreKind = env_parse("USER_STORE", "postgres");
        let seed_existing_emails = env_list("SEED_EXISTING_EMAILS", "existing@example.com");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            import,
            user_store,
            seed_existing_emails,
        }
    }
}

fn env_parse<T>(key: &str, default: &str) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse()
        .unwrap_or_else(|e| panic!("{key} has an invalid value '{raw}': {e}"))
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    split_list(&std::env::var(key).unwrap_or_else(|_| default.to_string()))
}

/// Split a comma-separated list, dropping blank entries.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
