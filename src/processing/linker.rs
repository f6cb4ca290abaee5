//! Transaction linking
//!
//! A linking pass walks the stored transaction set and reconciles it
//! against the wallet's public keys: locking scripts are classified,
//! outputs whose key hash belongs to a wallet key get an owner, inputs
//! that reference a known output get a spent-output annotation, and
//! each transaction's `is_mine` flag is recomputed. The pass is
//! idempotent and only writes transactions whose linked state actually
//! changed.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::core::{KeyId, OutPoint, ScriptType, SpentOutputRef};
use crate::crypto::address_from_key_hash;
use crate::processing::classify_script;
use crate::storage::WalletStore;

pub struct TransactionLinker {
    store: Arc<WalletStore>,
    address_version: u8,
}

impl TransactionLinker {
    pub fn new(store: Arc<WalletStore>, address_version: u8) -> Self {
        Self {
            store,
            address_version,
        }
    }

    /// Run one full linking pass. Returns the number of transactions
    /// that were updated.
    pub fn run(&self) -> usize {
        let mut transactions = self.store.transactions();
        if transactions.is_empty() {
            return 0;
        }

        let owners: HashMap<Vec<u8>, KeyId> = self
            .store
            .public_keys()
            .into_iter()
            .map(|key| (key.key_hash.clone(), key.key_id()))
            .collect();

        // Classification first, then owners, so spent-output annotations
        // see them
        for tx in &mut transactions {
            for output in &mut tx.outputs {
                if output.key_hash.is_none() && output.script_type == ScriptType::Unknown {
                    let (script_type, key_hash) = classify_script(&output.locking_script);
                    output.script_type = script_type;
                    if let Some(key_hash) = key_hash {
                        output.address =
                            Some(address_from_key_hash(&key_hash, self.address_version));
                        output.key_hash = Some(key_hash);
                    }
                }
                if let Some(key_hash) = &output.key_hash {
                    output.owner = owners.get(key_hash).copied();
                }
            }
        }

        let outputs: HashMap<OutPoint, SpentOutputRef> = transactions
            .iter()
            .flat_map(|tx| {
                tx.outputs.iter().map(|output| {
                    (
                        OutPoint {
                            tx_hash: tx.hash,
                            index: output.index,
                        },
                        SpentOutputRef {
                            value: output.value,
                            address: output.address.clone(),
                            mine: output.owner.is_some(),
                        },
                    )
                })
            })
            .collect();

        let mut changed = Vec::new();
        for mut tx in transactions {
            for input in &mut tx.inputs {
                input.spent_output = outputs.get(&input.outpoint()).cloned();
            }
            tx.is_mine = tx.outputs.iter().any(|o| o.owner.is_some())
                || tx
                    .inputs
                    .iter()
                    .any(|i| i.spent_output.as_ref().is_some_and(|s| s.mine));

            let unchanged = self
                .store
                .transaction(&tx.hash)
                .is_some_and(|stored| stored == tx);
            if !unchanged {
                changed.push(tx);
            }
        }

        let count = changed.len();
        if count > 0 {
            debug!("linking pass updated {count} transactions");
            self.store.write(|writer| {
                for tx in changed {
                    writer.insert_transaction(tx);
                }
            });
        }
        count
    }
}
