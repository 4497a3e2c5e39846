//! Background task that creates the selected users one row at a time.

use std::sync::Arc;

use examdesk_core::config::ImportConfig;
use examdesk_core::user_import::{ImportBatch, UploadRow};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::credentials::CredentialNotifier;
use crate::sessions::SharedFlow;
use crate::user_store::UserStore;

/// Spawn the processing loop for a session that just entered `Processing`.
///
/// `rows` are the selected rows in file order. The loop runs to completion;
/// it cannot be cancelled. Each created user's temporary password goes to
/// `notifier`; a failed delivery is logged and does not stop the import.
pub fn spawn_import(
    session_id: Uuid,
    flow: SharedFlow,
    store: Arc<dyn UserStore>,
    notifier: Arc<dyn CredentialNotifier>,
    config: ImportConfig,
    batch: ImportBatch,
    rows: Vec<UploadRow>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_import(session_id, flow, store, notifier, config, batch, rows).await;
    })
}

async fn run_import(
    session_id: Uuid,
    flow: SharedFlow,
    store: Arc<dyn UserStore>,
    notifier: Arc<dyn CredentialNotifier>,
    config: ImportConfig,
    batch: ImportBatch,
    rows: Vec<UploadRow>,
) {
    let batch_id = batch.batch_id.clone();
    tracing::info!(%session_id, %batch_id, rows = rows.len(), "Import processing started");
    save(store.as_ref(), &batch).await;

    let mut created: usize = 0;
    for row in rows {
        tokio::time::sleep(config.row_delay).await;

        let credentials = match store.create_user(&batch_id, &row).await {
            Ok(credentials) => credentials,
            Err(e) => {
                // Users created so far keep the batch tag but a failed
                // batch cannot be rolled back.
                tracing::error!(
                    %session_id,
                    %batch_id,
                    row = row.row_number,
                    stranded_users = created,
                    error = %e,
                    "Failed to create imported user",
                );
                let failed = flow
                    .lock()
                    .await
                    .fail(format!("Row {}: {e}", row.row_number))
                    .cloned();
                match failed {
                    Ok(batch) => save(store.as_ref(), &batch).await,
                    Err(e) => {
                        tracing::warn!(%session_id, error = %e, "Could not mark import failed")
                    }
                }
                return;
            }
        };
        created += 1;

        if let Err(e) = notifier.deliver(&batch_id, &credentials).await {
            tracing::warn!(
                %batch_id,
                to = %credentials.email,
                notifier = notifier.name(),
                error = %e,
                "Failed to deliver temporary password",
            );
        }

        let progress = flow.lock().await.record_row_processed(&config).cloned();
        match progress {
            Ok(batch) if batch.status.is_terminal() => {
                tracing::info!(
                    %session_id,
                    %batch_id,
                    created = batch.success_count,
                    "Import processing completed",
                );
                save(store.as_ref(), &batch).await;
            }
            Ok(batch) => {
                tracing::debug!(%batch_id, progress = batch.progress, "Import row processed");
            }
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "Import flow left processing early");
                return;
            }
        }
    }
}

/// Persist a batch snapshot. The audit record is best effort.
async fn save(store: &dyn UserStore, batch: &ImportBatch) {
    if let Err(e) = store.save_batch(batch).await {
        tracing::warn!(batch_id = %batch.batch_id, error = %e, "Failed to save import batch");
    }
}
