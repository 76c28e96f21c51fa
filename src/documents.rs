//! Document status: refresh, ingestion and periodic polling.
//!
//! Failures here never reach the user. They are logged, the document list
//! keeps its last known value and the indexing flag is still lowered.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::backend::DocumentGateway;
use crate::state::{BusyKind, SharedState};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(180);

#[derive(Clone)]
pub struct DocumentLibrary {
    state: SharedState,
    gateway: Arc<dyn DocumentGateway>,
    issued: Arc<AtomicU64>,
}

impl DocumentLibrary {
    pub fn new(state: SharedState, gateway: Arc<dyn DocumentGateway>) -> Self {
        Self {
            state,
            gateway,
            issued: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Replace the document set with a fresh listing. Returns false and
    /// leaves the store untouched if the listing could not be fetched.
    ///
    /// A listing that comes back after one issued later has already landed
    /// is dropped.
    pub async fn refresh(&self) -> bool {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        match self.gateway.refresh().await {
            Ok(snapshot) => {
                let documents = snapshot.documents.len();
                let indexed = snapshot.indexed_count;
                let applied = self.state.update(|s| {
                    s.apply_listing(generation, snapshot.documents, snapshot.indexed_count)
                });
                if applied {
                    tracing::info!(documents, indexed, "Document status refreshed");
                } else {
                    tracing::debug!(generation, "Discarded stale document listing");
                }
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Document refresh failed");
                false
            }
        }
    }

    /// Register a file with the knowledge base, then refresh.
    ///
    /// The indexing flag is held for the upload and the refresh that
    /// follows. Returns false if ingestion was already running or failed.
    pub async fn ingest(&self, file: PathBuf) -> bool {
        let Some(guard) = self.state.try_acquire(BusyKind::Indexing) else {
            tracing::debug!(file = %file.display(), "Ingestion already running");
            return false;
        };

        tracing::info!(file = %file.display(), "Ingesting document");
        let ingested = match self.gateway.ingest(&file).await {
            Ok(()) => self.refresh().await,
            Err(e) => {
                tracing::warn!(error = %e, file = %file.display(), "Document ingestion failed");
                false
            }
        };

        drop(guard);
        ingested
    }

    /// Refresh now and then on every `interval` until the handle is aborted.
    pub fn spawn_polling(&self, interval: Duration) -> JoinHandle<()> {
        let library = self.clone();
        tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "Document polling started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                library.refresh().await;
            }
        })
    }
}
