//! Predefined console roles a bulk import may assign.
//!
//! The CSV carries the display spelling (`Admin`, `SuperAdmin`, ...); the
//! database stores the snake_case name returned by [`Role::db_name`].

use serde::{Deserialize, Serialize};

/// A role from the fixed whitelist accepted by the user import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Creator,
    Reviewer,
    Translator,
    SuperAdmin,
}

impl Role {
    /// All importable roles, in display order.
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Creator,
        Role::Reviewer,
        Role::Translator,
        Role::SuperAdmin,
    ];

    /// Parse the exact CSV spelling of a role. Matching is case-sensitive.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == s)
    }

    /// The spelling used in CSV files and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Creator => "Creator",
            Self::Reviewer => "Reviewer",
            Self::Translator => "Translator",
            Self::SuperAdmin => "SuperAdmin",
        }
    }

    /// Name of the matching row in the `roles` lookup table.
    pub fn db_name(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Creator => "creator",
            Self::Reviewer => "reviewer",
            Self::Translator => "translator",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Comma-separated whitelist for user-facing messages.
    pub fn whitelist() -> String {
        Self::ALL
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
