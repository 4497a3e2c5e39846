//! examdesk API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes, user
//! stores) so integration tests and the binary entrypoint can both use them.

pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod password;
pub mod processing;
pub mod response;
pub mod router;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod user_store;
