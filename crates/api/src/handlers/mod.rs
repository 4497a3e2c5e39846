//! Request handlers.
//!
//! Handlers lock the session's flow only for the synchronous transition and
//! make every user-store call outside the lock, except for rollback.

pub mod user_import;
