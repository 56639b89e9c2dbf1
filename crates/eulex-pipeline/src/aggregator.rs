//! The single writer.
//!
//! Workers never touch the store. They send finished [`DocumentResult`]s
//! over a bounded channel and the aggregator, running on a blocking thread,
//! commits them one at a time.

use eulex_core::DocumentResult;
use eulex_store::DuckStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::Skipped;

/// Commit counts of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub committed: usize,
    /// Works written without a body. They are retried by the next run.
    pub committed_without_body: usize,
    pub failed: Vec<Skipped>,
}

pub struct Aggregator {
    store: DuckStore,
    stats: AggregateStats,
}

impl Aggregator {
    pub fn new(store: DuckStore) -> Self {
        Self {
            store,
            stats: AggregateStats::default(),
        }
    }

    /// Commit one document. A failed commit leaves the store unchanged for
    /// that document and is recorded, not raised.
    pub fn commit(&mut self, result: &DocumentResult) {
        let celex = &result.work.celex;
        match self.store.commit(result) {
            Ok(_) if result.work.full_text_html.is_none() => self.stats.committed_without_body += 1,
            Ok(_) => self.stats.committed += 1,
            Err(e) => {
                error!(celex = %celex, error = %e, "commit failed");
                self.stats.failed.push(Skipped {
                    id: celex.to_string(),
                    reason: format!("commit failed: {e}"),
                });
            }
        }
    }

    /// Commit everything the channel delivers until all senders are gone.
    pub fn drain(mut self, mut rx: mpsc::Receiver<DocumentResult>) -> (DuckStore, AggregateStats) {
        while let Some(result) = rx.blocking_recv() {
            self.commit(&result);
        }
        info!(
            committed = self.stats.committed,
            without_body = self.stats.committed_without_body,
            failed = self.stats.failed.len(),
            "aggregation finished"
        );
        (self.store, self.stats)
    }

    /// Run [`drain`](Self::drain) on the blocking pool.
    pub fn spawn(self, rx: mpsc::Receiver<DocumentResult>) -> JoinHandle<(DuckStore, AggregateStats)> {
        tokio::task::spawn_blocking(move || self.drain(rx))
    }
}
