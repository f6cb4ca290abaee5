//! Sync progress estimation
//!
//! Progress is the share of non-archived blocks whose transactions have
//! been downloaded. Archived bootstrap placeholders never count; they
//! were imported trusted, not synced.

use std::sync::Arc;

use tokio::sync::watch;

use crate::storage::WalletStore;

pub struct ProgressSyncer {
    store: Arc<WalletStore>,
    sender: watch::Sender<f64>,
}

impl ProgressSyncer {
    pub fn new(store: Arc<WalletStore>) -> Self {
        let (sender, _) = watch::channel(0.0);
        Self { store, sender }
    }

    /// Current ratio of synced to known non-archived blocks. An empty
    /// chain reports zero.
    pub fn progress(&self) -> f64 {
        let (synced, total) = self.store.block_counts();
        if total == 0 {
            0.0
        } else {
            synced as f64 / total as f64
        }
    }

    /// Recompute and publish to watchers
    pub fn recalculate(&self) {
        let _ = self.sender.send(self.progress());
    }

    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.sender.subscribe()
    }
}
