//! Registry of in-progress import sessions.
//!
//! Each session owns one [`ImportFlow`] behind its own mutex so the
//! processing task and request handlers for different sessions never
//! contend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use examdesk_core::error::CoreError;
use examdesk_core::user_import::{ImportFlow, ImportStep};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// How often [`SessionRegistry::drain_imports`] re-checks running imports.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// One session's flow, shared with its processing task.
pub type SharedFlow = Arc<Mutex<ImportFlow>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SharedFlow>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session in the upload step.
    pub async fn create(&self) -> (Uuid, SharedFlow) {
        let id = Uuid::new_v4();
        let flow = Arc::new(Mutex::new(ImportFlow::new()));
        self.sessions.write().await.insert(id, Arc::clone(&flow));
        (id, flow)
    }

    pub async fn get(&self, id: Uuid) -> Result<SharedFlow, CoreError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| session_not_found(id))
    }

    /// Drop a session. Refused while its import is processing.
    pub async fn remove(&self, id: Uuid) -> Result<(), CoreError> {
        let mut sessions = self.sessions.write().await;
        let flow = sessions.get(&id).ok_or_else(|| session_not_found(id))?;
        if flow.lock().await.step() == ImportStep::Processing {
            return Err(CoreError::Conflict(
                "Cannot delete a session while its import is processing".to_string(),
            ));
        }
        sessions.remove(&id);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Number of sessions whose import is still processing.
    pub async fn processing_count(&self) -> usize {
        let flows: Vec<SharedFlow> = self.sessions.read().await.values().cloned().collect();
        let mut count = 0;
        for flow in flows {
            if flow.lock().await.step() == ImportStep::Processing {
                count += 1;
            }
        }
        count
    }

    /// Wait until no import is processing. Callers bound this with a timeout.
    pub async fn drain_imports(&self) {
        loop {
            let running = self.processing_count().await;
            if running == 0 {
                return;
            }
            tracing::info!(running, "Waiting for running imports to finish");
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }
}

fn session_not_found(id: Uuid) -> CoreError {
    CoreError::NotFound {
        entity: "ImportSession",
        id: id.to_string(),
    }
}
