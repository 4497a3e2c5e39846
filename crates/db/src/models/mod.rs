//! Row structs and insert DTOs.
//!
//! Each submodule holds a `FromRow` entity matching its table and the
//! input struct its repository binds from.

pub mod import_batch;
pub mod user;
