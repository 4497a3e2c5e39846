//! Core domain logic for the examdesk bulk user import.
//!
//! Everything in this crate is pure: no database, no async runtime, no
//! network. The api crate wires these pieces to HTTP and persistence.

pub mod config;
pub mod error;
pub mod roles;
pub mod types;
pub mod user_import;
