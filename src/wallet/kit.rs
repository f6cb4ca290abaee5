//! Wallet facade
//!
//! Builds the full dependency graph once at construction and exposes
//! the operations a consumer needs: start syncing, send, query balance
//! and history, and subscribe to change events.

use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::api::{ApiError, BlockHashFetcher};
use crate::core::{Block, Network, NetworkParams, Transaction};
use crate::crypto::{Hash256, KeyError};
use crate::network::PeerTransport;
use crate::processing::{TransactionLinker, TransactionProcessor};
use crate::storage::{ChangeSet, StoreEvent, WalletStore};
use crate::sync::{
    HeaderHandler, HeaderSyncer, ProgressSyncer, SyncError, Syncer, TransactionHandler,
};
use crate::validation::ValidatedBlockFactory;
use crate::wallet::{
    AddressConverter, AddressManager, SeedKeyDeriver, SendError, TransactionBuilder,
    TransactionCreator, TransactionError,
};
use crate::wire::MerkleBlockMessage;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Bootstrap(#[from] ApiError),
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Change notifications delivered to wallet consumers
#[derive(Debug, Clone)]
pub enum WalletEvent {
    TransactionsUpdated(ChangeSet<Hash256>),
    BalanceUpdated(u64),
    LastBlockHeightUpdated(u64),
    ProgressUpdated(f64),
}

/// Consumer-facing view of a wallet transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionInfo {
    pub hash: Hash256,
    pub from_addresses: Vec<String>,
    pub to_addresses: Vec<String>,
    /// Net effect on the wallet balance in satoshis
    pub amount: i64,
    pub block_height: Option<u64>,
    pub timestamp: Option<u32>,
}

pub struct SpvWallet {
    store: Arc<WalletStore>,
    params: Arc<NetworkParams>,
    manager: Arc<AddressManager>,
    builder: TransactionBuilder,
    creator: TransactionCreator,
    syncer: Syncer,
    header_syncer: HeaderSyncer,
    progress: Arc<ProgressSyncer>,
    bootstrap: Option<Arc<dyn BlockHashFetcher>>,
    events: broadcast::Sender<WalletEvent>,
}

impl SpvWallet {
    pub fn new(
        network: Network,
        seed: Vec<u8>,
        transport: Arc<dyn PeerTransport>,
        bootstrap: Option<Arc<dyn BlockHashFetcher>>,
    ) -> Self {
        let store = Arc::new(WalletStore::new());
        let params = Arc::new(NetworkParams::for_network(network));

        let deriver = Arc::new(SeedKeyDeriver::new(seed));
        let manager = Arc::new(AddressManager::new(
            store.clone(),
            deriver,
            params.address_version,
        ));

        let linker = TransactionLinker::new(store.clone(), params.address_version);
        let processor = TransactionProcessor::spawn(linker);
        let progress = Arc::new(ProgressSyncer::new(store.clone()));

        let transaction_handler = TransactionHandler::new(
            store.clone(),
            params.clone(),
            ValidatedBlockFactory::new(store.clone(), params.clone()),
            processor,
            progress.clone(),
        );
        let syncer = Syncer::new(store.clone(), transaction_handler);

        let header_handler = HeaderHandler::new(
            store.clone(),
            ValidatedBlockFactory::new(store.clone(), params.clone()),
        );
        let header_syncer = HeaderSyncer::new(
            store.clone(),
            params.clone(),
            transport.clone(),
            header_handler,
        );

        let builder = TransactionBuilder::new(
            store.clone(),
            manager.clone(),
            AddressConverter::new(params.address_version),
        );
        let creator = TransactionCreator::new(
            store.clone(),
            TransactionBuilder::new(
                store.clone(),
                manager.clone(),
                AddressConverter::new(params.address_version),
            ),
            TransactionLinker::new(store.clone(), params.address_version),
            manager.clone(),
            transport,
        );

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            store,
            params,
            manager,
            builder,
            creator,
            syncer,
            header_syncer,
            progress,
            bootstrap,
            events,
        }
    }

    /// Prepare the wallet and run header sync to the chain tip:
    /// recover interrupted state, fill the key pool, seed the
    /// checkpoint, import bootstrap block hashes, then pull headers.
    pub async fn start(&self) -> Result<(), WalletError> {
        self.syncer.reset_stalled_blocks();
        self.manager.fill_gap()?;

        if self.store.is_empty() {
            if let Some(checkpoint) = self.params.checkpoint_block() {
                info!("seeding chain from checkpoint at height {}", checkpoint.height);
                self.store.write(|writer| writer.insert_block(checkpoint));
            }
        }

        if let Some(fetcher) = &self.bootstrap {
            self.import_bootstrap_hashes(fetcher.as_ref()).await?;
        }

        self.spawn_event_translation();
        self.header_syncer.sync().await?;
        Ok(())
    }

    /// Mark blocks known to touch our addresses without headers; their
    /// transactions were imported trusted, so they stay archived.
    async fn import_bootstrap_hashes(
        &self,
        fetcher: &dyn BlockHashFetcher,
    ) -> Result<(), ApiError> {
        let mut seen = std::collections::HashSet::new();
        let mut placeholders = Vec::new();
        for key in self.store.public_keys() {
            for (hash, height) in fetcher.block_hashes(&key.address).await? {
                // Blocks can show up under several of our addresses
                if seen.insert(hash) && self.store.block(&hash).is_none() {
                    placeholders.push(Block::archived_placeholder(hash, height));
                }
            }
        }

        if !placeholders.is_empty() {
            info!("importing {} bootstrap block hashes", placeholders.len());
            self.store.write(|writer| {
                for block in placeholders {
                    writer.insert_block(block);
                }
            });
        }
        Ok(())
    }

    /// Translate store change notifications into consumer events
    fn spawn_event_translation(&self) {
        let mut store_events = self.store.subscribe();
        let store = self.store.clone();
        let progress = self.progress.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            loop {
                match store_events.recv().await {
                    Ok(StoreEvent::Transactions(changes)) => {
                        let _ = events.send(WalletEvent::TransactionsUpdated(changes));
                        let _ = events.send(WalletEvent::BalanceUpdated(store.balance()));
                    }
                    Ok(StoreEvent::Blocks(_)) => {
                        if let Some(block) = store.last_block() {
                            let _ = events.send(WalletEvent::LastBlockHeightUpdated(block.height));
                        }
                        let _ = events.send(WalletEvent::ProgressUpdated(progress.progress()));
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("event translation lagged, {missed} store events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Spending
    // ------------------------------------------------------------------

    pub async fn send(
        &self,
        to_address: &str,
        value: u64,
        fee_rate: u64,
        sender_pays_fee: bool,
    ) -> Result<Hash256, SendError> {
        self.creator
            .create(to_address, value, fee_rate, sender_pays_fee)
            .await
    }

    pub fn validate_address(&self, address: &str) -> Result<(), TransactionError> {
        AddressConverter::new(self.params.address_version)
            .decode(address)
            .map(|_| ())
    }

    pub fn fee(
        &self,
        value: u64,
        fee_rate: u64,
        sender_pays_fee: bool,
    ) -> Result<u64, TransactionError> {
        self.builder.fee(value, fee_rate, sender_pays_fee)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn balance(&self) -> u64 {
        self.store.balance()
    }

    pub fn last_block_height(&self) -> u64 {
        self.store.last_block().map(|b| b.height).unwrap_or(0)
    }

    pub fn progress(&self) -> f64 {
        self.progress.progress()
    }

    pub fn receive_address(&self) -> Result<String, KeyError> {
        self.manager.receive_address()
    }

    /// Wallet-relevant transactions in insertion order
    pub fn transactions(&self) -> Vec<TransactionInfo> {
        self.store
            .transactions()
            .into_iter()
            .filter(|tx| tx.is_mine)
            .map(|tx| self.transaction_info(tx))
            .collect()
    }

    fn transaction_info(&self, tx: Transaction) -> TransactionInfo {
        let received: u64 = tx
            .outputs
            .iter()
            .filter(|o| o.owner.is_some())
            .map(|o| o.value)
            .sum();
        let spent: u64 = tx
            .inputs
            .iter()
            .filter_map(|i| i.spent_output.as_ref())
            .filter(|s| s.mine)
            .map(|s| s.value)
            .sum();

        let block = tx.block_hash.and_then(|hash| self.store.block(&hash));
        let timestamp = block
            .as_ref()
            .and_then(|b| b.header.as_ref())
            .map(|h| h.timestamp);

        TransactionInfo {
            hash: tx.hash,
            from_addresses: tx
                .inputs
                .iter()
                .filter_map(|i| i.spent_output.as_ref())
                .filter_map(|s| s.address.clone())
                .collect(),
            to_addresses: tx.outputs.iter().filter_map(|o| o.address.clone()).collect(),
            amount: received as i64 - spent as i64,
            block_height: block.as_ref().map(|b| b.height),
            timestamp,
        }
    }

    // ------------------------------------------------------------------
    // Inbound peer data
    // ------------------------------------------------------------------

    pub fn handle_merkle_block(
        &self,
        message: MerkleBlockMessage,
        transactions: Vec<Transaction>,
    ) -> Result<(), SyncError> {
        self.syncer.handle_merkle_block(message, transactions)
    }

    pub fn handle_mempool(&self, transactions: Vec<Transaction>) {
        self.syncer.handle_mempool(transactions);
    }
}
