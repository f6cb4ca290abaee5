//! Chain synchronization
//!
//! Header batches, merkle blocks and mempool transactions each have a
//! dedicated handler; [`Syncer`] is the dispatch point peer message
//! plumbing feeds into.

pub mod header_handler;
pub mod header_syncer;
pub mod progress;
pub mod transaction_handler;

pub use header_handler::HeaderHandler;
pub use header_syncer::HeaderSyncer;
pub use progress::ProgressSyncer;
pub use transaction_handler::TransactionHandler;

use std::sync::Arc;

use thiserror::Error;

use crate::core::Transaction;
use crate::crypto::ProofError;
use crate::network::PeerError;
use crate::storage::WalletStore;
use crate::validation::ValidationError;
use crate::wire::MerkleBlockMessage;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Proof(#[from] ProofError),
    #[error(transparent)]
    Peer(#[from] PeerError),
}

/// Entry point for incoming chain data
pub struct Syncer {
    store: Arc<WalletStore>,
    transactions: TransactionHandler,
}

impl Syncer {
    pub fn new(store: Arc<WalletStore>, transactions: TransactionHandler) -> Self {
        Self {
            store,
            transactions,
        }
    }

    /// Verify a merkle block and absorb its proven transactions.
    ///
    /// Every delivered transaction must appear in the proven set; a
    /// single unproven one rejects the whole message before anything is
    /// stored.
    pub fn handle_merkle_block(
        &self,
        message: MerkleBlockMessage,
        transactions: Vec<Transaction>,
    ) -> Result<(), SyncError> {
        let proven = message.verified_transaction_hashes()?;
        for tx in &transactions {
            if !proven.contains(&tx.hash) {
                return Err(ProofError::UnprovenTransaction(tx.hash).into());
            }
        }

        self.transactions.handle_block(message.header, transactions)?;
        Ok(())
    }

    /// Absorb loose mempool transactions
    pub fn handle_mempool(&self, transactions: Vec<Transaction>) {
        self.transactions.handle_mempool(transactions);
    }

    /// Blocks left mid-download by a previous run go back to pending
    pub fn reset_stalled_blocks(&self) {
        self.store.write(|writer| writer.reset_syncing_blocks());
    }
}
