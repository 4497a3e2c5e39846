//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod import_batch_repo;
pub mod user_repo;

pub use import_batch_repo::ImportBatchRepo;
pub use user_repo::UserRepo;
