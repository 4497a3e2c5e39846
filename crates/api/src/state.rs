use std::sync::Arc;

use crate::config::ServerConfig;
use crate::credentials::CredentialNotifier;
use crate::sessions::SessionRegistry;
use crate::user_store::UserStore;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server and import configuration.
    pub config: Arc<ServerConfig>,
    /// Where imported users are created and rolled back.
    pub store: Arc<dyn UserStore>,
    /// Receives the temporary password of every imported user.
    pub notifier: Arc<dyn CredentialNotifier>,
    /// Open import sessions.
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn UserStore>,
        notifier: Arc<dyn CredentialNotifier>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            notifier,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}
