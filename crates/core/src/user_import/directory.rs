//! The existing-user directory consulted during validation.
//!
//! Validation is synchronous, so callers backed by a database prefetch the
//! relevant emails into a [`KnownEmails`] set first (see
//! [`candidate_emails`]).

use std::collections::HashSet;

use super::row::RawRow;
use super::validator::is_valid_email;

/// Answers whether an email already belongs to a user. Matching is
/// case-insensitive.
pub trait UserDirectory {
    fn contains_email(&self, email: &str) -> bool;
}

/// Any `Fn(&str) -> bool` predicate can serve as a directory.
impl<F> UserDirectory for F
where
    F: Fn(&str) -> bool,
{
    fn contains_email(&self, email: &str) -> bool {
        self(email)
    }
}

/// A snapshot of existing emails, stored lower-cased.
#[derive(Debug, Clone, Default)]
pub struct KnownEmails {
    emails: HashSet<String>,
}

impl KnownEmails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, email: &str) {
        self.emails.insert(email.trim().to_lowercase());
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for KnownEmails {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut known = Self::new();
        for email in iter {
            known.insert(email.as_ref());
        }
        known
    }
}

impl UserDirectory for KnownEmails {
    fn contains_email(&self, email: &str) -> bool {
        self.emails.contains(&email.trim().to_lowercase())
    }
}

/// Distinct, lower-cased, well-formed emails from the parsed rows: the only
/// ones the existing-user check will ever ask about.
pub fn candidate_emails(rows: &[RawRow]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|row| row.email.trim().to_lowercase())
        .filter(|email| is_valid_email(email))
        .filter(|email| seen.insert(email.clone()))
        .collect()
}
