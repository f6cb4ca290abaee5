//! Incoming transaction handling
//!
//! Transactions arrive two ways: proven inside a block, or loose from
//! the mempool. Both paths merge into the store rather than overwrite,
//! so annotations from earlier linking passes survive, and a relink is
//! scheduled only when something actually changed. Status moves are
//! monotonic: a relayed transaction never regresses to new.

use std::sync::Arc;

use log::debug;

use crate::core::{BlockHeader, BlockStatus, NetworkParams, Transaction, TransactionStatus};
use crate::processing::{extract_outputs, TransactionProcessor};
use crate::storage::{StoreWriter, WalletStore};
use crate::sync::ProgressSyncer;
use crate::validation::{ValidatedBlockFactory, ValidationError};

pub struct TransactionHandler {
    store: Arc<WalletStore>,
    params: Arc<NetworkParams>,
    factory: ValidatedBlockFactory,
    processor: TransactionProcessor,
    progress: Arc<ProgressSyncer>,
}

impl TransactionHandler {
    pub fn new(
        store: Arc<WalletStore>,
        params: Arc<NetworkParams>,
        factory: ValidatedBlockFactory,
        processor: TransactionProcessor,
        progress: Arc<ProgressSyncer>,
    ) -> Self {
        Self {
            store,
            params,
            factory,
            processor,
            progress,
        }
    }

    /// Absorb a block's proven transactions.
    ///
    /// A block with no wallet-relevant transactions only advances the
    /// progress bookkeeping. Otherwise the block is resolved (reusing
    /// the one header sync already stored, or validating a fresh one),
    /// every transaction is merged attached to it, and the block is
    /// marked synced.
    pub fn handle_block(
        &self,
        header: BlockHeader,
        transactions: Vec<Transaction>,
    ) -> Result<(), ValidationError> {
        if transactions.is_empty() {
            self.progress.recalculate();
            return Ok(());
        }

        let mut block = match self.store.block(&header.hash()) {
            Some(block) => block,
            None => self.factory.block_from_header(header, None)?,
        };
        block.status = BlockStatus::Synced;
        let block_hash = block.header_hash;

        self.store.write(|writer| {
            writer.insert_block(block);
            for mut tx in transactions {
                tx.block_hash = Some(block_hash);
                tx.status = TransactionStatus::Relayed;
                self.merge(writer, tx);
            }
        });

        self.processor.enqueue_run();
        self.progress.recalculate();
        Ok(())
    }

    /// Absorb loose mempool transactions. A relink is scheduled only if
    /// at least one transaction was new or changed status.
    pub fn handle_mempool(&self, transactions: Vec<Transaction>) {
        if transactions.is_empty() {
            return;
        }

        let changed = self.store.write(|writer| {
            let mut changed = false;
            for mut tx in transactions {
                tx.status = TransactionStatus::Relayed;
                changed |= self.merge(writer, tx);
            }
            changed
        });

        if changed {
            self.processor.enqueue_run();
        }
    }

    /// Merge one incoming transaction. Returns whether the store changed.
    fn merge(&self, writer: &mut StoreWriter<'_>, incoming: Transaction) -> bool {
        match writer.transaction(&incoming.hash) {
            Some(stored) => {
                // Known transaction: only confirmation state may move
                let mut updated = stored.clone();
                updated.status = TransactionStatus::Relayed;
                if incoming.block_hash.is_some() {
                    updated.block_hash = incoming.block_hash;
                }
                if updated == *stored {
                    return false;
                }
                debug!("transaction {} confirmed", updated.hash);
                writer.insert_transaction(updated);
                true
            }
            None => {
                let mut tx = incoming;
                extract_outputs(&mut tx, self.params.address_version);
                writer.insert_transaction(tx);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Block, Network, ScriptType, TransactionOutput};
    use crate::processing::TransactionLinker;

    fn handler() -> (Arc<WalletStore>, Arc<NetworkParams>, TransactionHandler) {
        let store = Arc::new(WalletStore::new());
        let params = Arc::new(NetworkParams::for_network(Network::BitcoinRegTest));
        let factory = ValidatedBlockFactory::new(store.clone(), params.clone());
        let linker = TransactionLinker::new(store.clone(), params.address_version);
        let processor = TransactionProcessor::spawn(linker);
        let progress = Arc::new(ProgressSyncer::new(store.clone()));
        let handler =
            TransactionHandler::new(store.clone(), params.clone(), factory, processor, progress);
        (store, params, handler)
    }

    fn header_after(previous: &Block) -> BlockHeader {
        let prev = previous.header.as_ref().unwrap();
        BlockHeader {
            version: 1,
            previous_hash: previous.header_hash,
            merkle_root: crate::crypto::double_sha256(b"txs"),
            timestamp: prev.timestamp + 600,
            bits: prev.bits,
            nonce: 0,
        }
    }

    fn p2pkh_tx(seed: u8) -> Transaction {
        let mut script = vec![0x76, 0xa9, 0x14];
        script.extend_from_slice(&[seed; 20]);
        script.extend_from_slice(&[0x88, 0xac]);
        Transaction::new(
            1,
            vec![],
            vec![TransactionOutput::new(1_000, script, 0)],
            0,
            TransactionStatus::New,
        )
    }

    #[tokio::test]
    async fn test_block_stores_and_confirms_transactions() {
        let (store, params, handler) = handler();
        let checkpoint = params.checkpoint_block().unwrap();
        let header = header_after(&checkpoint);
        let block_hash = header.hash();
        let tx = p2pkh_tx(0x01);

        handler.handle_block(header, vec![tx.clone()]).unwrap();

        let stored_block = store.block(&block_hash).unwrap();
        assert_eq!(stored_block.status, BlockStatus::Synced);
        assert_eq!(stored_block.height, checkpoint.height + 1);

        let stored = store.transaction(&tx.hash).unwrap();
        assert_eq!(stored.status, TransactionStatus::Relayed);
        assert_eq!(stored.block_hash, Some(block_hash));
        // Extraction ran at ingestion
        assert_eq!(stored.outputs[0].script_type, ScriptType::P2pkh);
    }

    #[tokio::test]
    async fn test_block_confirms_known_mempool_transaction() {
        let (store, params, handler) = handler();
        let checkpoint = params.checkpoint_block().unwrap();
        let tx = p2pkh_tx(0x02);

        handler.handle_mempool(vec![tx.clone()]);
        let pending = store.transaction(&tx.hash).unwrap();
        assert_eq!(pending.status, TransactionStatus::Relayed);
        assert!(pending.block_hash.is_none());

        let header = header_after(&checkpoint);
        let block_hash = header.hash();
        handler.handle_block(header, vec![tx.clone()]).unwrap();

        let stored = store.transaction(&tx.hash).unwrap();
        assert_eq!(stored.block_hash, Some(block_hash));
        // Merged, not duplicated
        assert_eq!(store.transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_block_reuses_stored_block() {
        let (store, params, handler) = handler();
        let checkpoint = params.checkpoint_block().unwrap();
        let header = header_after(&checkpoint);
        let known = Block::from_header(header.clone(), checkpoint.height + 1);
        store.write(|writer| writer.insert_block(known));

        handler.handle_block(header.clone(), vec![p2pkh_tx(0x03)]).unwrap();
        assert_eq!(
            store.block(&header.hash()).unwrap().status,
            BlockStatus::Synced
        );
    }

    #[tokio::test]
    async fn test_empty_block_only_advances_progress() {
        let (store, params, handler) = handler();
        let checkpoint = params.checkpoint_block().unwrap();
        let header = header_after(&checkpoint);

        handler.handle_block(header.clone(), vec![]).unwrap();

        assert!(store.block(&header.hash()).is_none());
        assert!(store.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_mempool_redelivery_is_noop() {
        let (store, _, handler) = handler();
        let tx = p2pkh_tx(0x04);

        handler.handle_mempool(vec![tx.clone()]);
        let first = store.transaction(&tx.hash).unwrap();

        handler.handle_mempool(vec![tx.clone()]);
        assert_eq!(store.transaction(&tx.hash).unwrap(), first);
    }

    #[tokio::test]
    async fn test_empty_mempool_is_noop() {
        let (store, _, handler) = handler();
        handler.handle_mempool(vec![]);
        assert!(store.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_checkpointless_network_propagates_error() {
        let (store, _, _) = handler();
        let mut bare = NetworkParams::for_network(Network::BitcoinRegTest);
        bare.checkpoint = None;
        let params = Arc::new(bare);
        let factory = ValidatedBlockFactory::new(store.clone(), params.clone());
        let linker = TransactionLinker::new(store.clone(), params.address_version);
        let processor = TransactionProcessor::spawn(linker);
        let progress = Arc::new(ProgressSyncer::new(store.clone()));
        let handler = TransactionHandler::new(store, params, factory, processor, progress);

        let header = BlockHeader {
            version: 1,
            previous_hash: crate::crypto::Hash256::ZERO,
            merkle_root: crate::crypto::Hash256::ZERO,
            timestamp: 1_300_000_000,
            bits: 0x207fffff,
            nonce: 0,
        };
        assert_eq!(
            handler.handle_block(header, vec![p2pkh_tx(0x05)]).unwrap_err(),
            ValidationError::NoCheckpointBlock
        );
    }
}
