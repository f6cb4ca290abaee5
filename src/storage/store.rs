//! In-memory wallet store
//!
//! Gives the wallet core the store semantics it is built around:
//! scoped write transactions that commit atomically, plain read
//! queries, and typed change notifications carrying the
//! inserted/updated/deleted sets per entity.
//!
//! Writers take the lock for the whole scoped transaction and never
//! hold it across an await point; readers observe either a fully-pre or
//! fully-post state.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;

use crate::core::{
    Block, BlockStatus, OutPoint, PublicKey, Transaction, TransactionOutput,
};
use crate::crypto::Hash256;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Keys of entities touched by one committed store transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet<K> {
    pub inserted: Vec<K>,
    pub updated: Vec<K>,
    pub deleted: Vec<K>,
}

impl<K> ChangeSet<K> {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

// Manual impl: an empty change set needs no `K: Default`
impl<K> Default for ChangeSet<K> {
    fn default() -> Self {
        Self {
            inserted: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

/// Change notification emitted after a scoped transaction commits
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Blocks(ChangeSet<Hash256>),
    Transactions(ChangeSet<Hash256>),
}

#[derive(Default)]
struct StoreData {
    blocks: HashMap<Hash256, Block>,
    /// Height index over the single stored chain
    heights: BTreeMap<u64, Hash256>,
    transactions: HashMap<Hash256, Transaction>,
    /// Insertion order of transactions
    transaction_order: Vec<Hash256>,
    public_keys: Vec<PublicKey>,
}

/// The shared chain/UTXO substrate. All mutation goes through
/// [`WalletStore::write`], which is the scoped-transaction boundary.
pub struct WalletStore {
    inner: RwLock<StoreData>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for WalletStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(StoreData::default()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // A poisoned lock means a writer panicked; the data itself is still
    // consistent per committed transaction, so recover the guard.
    fn read(&self) -> RwLockReadGuard<'_, StoreData> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, StoreData> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a scoped write transaction. Changes are visible to readers
    /// only after `f` returns, and notifications fire after the lock is
    /// released.
    pub fn write<R>(&self, f: impl FnOnce(&mut StoreWriter<'_>) -> R) -> R {
        let (result, block_changes, tx_changes) = {
            let mut guard = self.write_lock();
            let mut writer = StoreWriter {
                data: &mut guard,
                block_changes: ChangeSet::default(),
                tx_changes: ChangeSet::default(),
            };
            let result = f(&mut writer);
            let StoreWriter {
                block_changes,
                tx_changes,
                ..
            } = writer;
            (result, block_changes, tx_changes)
        };

        if !block_changes.is_empty() {
            let _ = self.events.send(StoreEvent::Blocks(block_changes));
        }
        if !tx_changes.is_empty() {
            let _ = self.events.send(StoreEvent::Transactions(tx_changes));
        }
        result
    }

    // ------------------------------------------------------------------
    // Block queries
    // ------------------------------------------------------------------

    pub fn block(&self, hash: &Hash256) -> Option<Block> {
        self.read().blocks.get(hash).cloned()
    }

    pub fn block_at_height(&self, height: u64) -> Option<Block> {
        let data = self.read();
        let hash = data.heights.get(&height)?;
        data.blocks.get(hash).cloned()
    }

    /// Highest non-archived block (the chain head)
    pub fn last_block(&self) -> Option<Block> {
        let data = self.read();
        data.heights
            .values()
            .rev()
            .filter_map(|hash| data.blocks.get(hash))
            .find(|block| !block.archived)
            .cloned()
    }

    /// Hashes of the most recent non-archived blocks, newest first
    pub fn recent_block_hashes(&self, count: usize) -> Vec<Hash256> {
        let data = self.read();
        data.heights
            .values()
            .rev()
            .filter_map(|hash| data.blocks.get(hash))
            .filter(|block| !block.archived)
            .take(count)
            .map(|block| block.header_hash)
            .collect()
    }

    pub fn block_counts(&self) -> (usize, usize) {
        let data = self.read();
        let total = data.blocks.values().filter(|b| !b.archived).count();
        let synced = data
            .blocks
            .values()
            .filter(|b| !b.archived && b.status == BlockStatus::Synced)
            .count();
        (synced, total)
    }

    pub fn is_empty(&self) -> bool {
        self.read().blocks.is_empty()
    }

    // ------------------------------------------------------------------
    // Transaction queries
    // ------------------------------------------------------------------

    pub fn transaction(&self, hash: &Hash256) -> Option<Transaction> {
        self.read().transactions.get(hash).cloned()
    }

    /// All stored transactions in insertion order
    pub fn transactions(&self) -> Vec<Transaction> {
        let data = self.read();
        data.transaction_order
            .iter()
            .filter_map(|hash| data.transactions.get(hash))
            .cloned()
            .collect()
    }

    /// Outpoints referenced by any stored input
    pub fn spent_outpoints(&self) -> HashSet<OutPoint> {
        let data = self.read();
        data.transactions
            .values()
            .flat_map(|tx| tx.inputs.iter().map(|input| input.outpoint()))
            .collect()
    }

    /// The spendable set: outputs owned by a wallet key, with a
    /// recognized simple script type, not referenced by any input
    pub fn unspent_outputs(&self) -> Vec<(OutPoint, TransactionOutput)> {
        let spent = self.spent_outpoints();
        let data = self.read();
        let mut unspent = Vec::new();
        for hash in &data.transaction_order {
            let Some(tx) = data.transactions.get(hash) else {
                continue;
            };
            for output in &tx.outputs {
                let outpoint = OutPoint {
                    tx_hash: tx.hash,
                    index: output.index,
                };
                if output.owner.is_some()
                    && output.script_type.is_simple()
                    && !spent.contains(&outpoint)
                {
                    unspent.push((outpoint, output.clone()));
                }
            }
        }
        unspent
    }

    pub fn balance(&self) -> u64 {
        self.unspent_outputs()
            .iter()
            .map(|(_, output)| output.value)
            .sum()
    }

    // ------------------------------------------------------------------
    // Public key queries
    // ------------------------------------------------------------------

    pub fn public_keys(&self) -> Vec<PublicKey> {
        self.read().public_keys.clone()
    }
}

/// Mutation handle passed to the scoped-transaction closure
pub struct StoreWriter<'a> {
    data: &'a mut StoreData,
    block_changes: ChangeSet<Hash256>,
    tx_changes: ChangeSet<Hash256>,
}

impl StoreWriter<'_> {
    pub fn insert_block(&mut self, block: Block) {
        let hash = block.header_hash;
        self.data.heights.insert(block.height, hash);
        if self.data.blocks.insert(hash, block).is_some() {
            self.block_changes.updated.push(hash);
        } else {
            self.block_changes.inserted.push(hash);
        }
    }

    pub fn block(&self, hash: &Hash256) -> Option<&Block> {
        self.data.blocks.get(hash)
    }

    pub fn insert_transaction(&mut self, tx: Transaction) {
        let hash = tx.hash;
        if self.data.transactions.insert(hash, tx).is_some() {
            self.tx_changes.updated.push(hash);
        } else {
            self.data.transaction_order.push(hash);
            self.tx_changes.inserted.push(hash);
        }
    }

    pub fn transaction(&self, hash: &Hash256) -> Option<&Transaction> {
        self.data.transactions.get(hash)
    }

    pub fn add_public_keys(&mut self, keys: Vec<PublicKey>) {
        self.data.public_keys.extend(keys);
    }

    /// Blocks stuck mid-download from a previous run go back to pending
    pub fn reset_syncing_blocks(&mut self) {
        for block in self.data.blocks.values_mut() {
            if block.status == BlockStatus::Syncing {
                block.status = BlockStatus::Pending;
                self.block_changes.updated.push(block.header_hash);
            }
        }
    }

    /// Full wallet reset: the only path that deletes blocks
    pub fn clear(&mut self) {
        let block_hashes: Vec<Hash256> = self.data.blocks.keys().copied().collect();
        let tx_hashes: Vec<Hash256> = self.data.transaction_order.clone();
        self.block_changes.deleted.extend(block_hashes);
        self.tx_changes.deleted.extend(tx_hashes);
        *self.data = StoreData::default();
    }
}

impl crate::validation::BlockLookup for WalletStore {
    fn block_back(&self, block: &Block, steps: u64) -> Option<Block> {
        let height = block.height.checked_sub(steps)?;
        self.block_at_height(height)
    }
}
