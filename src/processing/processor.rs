//! Coalesced linking driver
//!
//! Many events want a relink (new block transactions, mempool arrivals,
//! fresh public keys). Running a pass per event would be wasted work,
//! so triggers funnel through a capacity-one channel: at most one pass
//! runs at a time, with at most one follow-up pending. Extra triggers
//! while both slots are taken are dropped; the pending pass will see
//! their changes anyway.

use tokio::sync::mpsc;

use crate::processing::TransactionLinker;

#[derive(Clone)]
pub struct TransactionProcessor {
    trigger: mpsc::Sender<()>,
}

impl TransactionProcessor {
    /// Spawn the worker that owns the linker and runs passes on demand
    pub fn spawn(linker: TransactionLinker) -> Self {
        let (trigger, mut wakeups) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            while wakeups.recv().await.is_some() {
                linker.run();
            }
        });
        Self { trigger }
    }

    /// Request a linking pass. Never blocks; a pass is already queued if
    /// the send loses out.
    pub fn enqueue_run(&self) {
        let _ = self.trigger.try_send(());
    }
}
