//! Address pool management
//!
//! The wallet watches a look-ahead window of derived keys per chain
//! (external for receiving, internal for change). A key counts as used
//! once any stored output pays to it; the pool is topped up so the gap
//! of unused keys past the last used one never shrinks below the limit.

use std::collections::HashSet;
use std::sync::Arc;

use log::debug;

use crate::core::PublicKey;
use crate::crypto::{address_from_key_hash, sha256, KeyError, KeyPair};
use crate::storage::WalletStore;

/// Unused keys kept ahead of the last used one, per chain
pub const GAP_LIMIT: u32 = 20;

/// Deterministic key derivation seam. The wallet core only sees public
/// keys; private material is requested per signature.
pub trait KeyDeriver: Send + Sync {
    fn derive(&self, index: u32, external: bool) -> Result<KeyPair, KeyError>;
}

/// Derives keys by hashing the seed with the chain and index. Each
/// (chain, index) pair maps to a stable secp256k1 key.
pub struct SeedKeyDeriver {
    seed: Vec<u8>,
}

impl SeedKeyDeriver {
    pub fn new(seed: Vec<u8>) -> Self {
        Self { seed }
    }
}

impl KeyDeriver for SeedKeyDeriver {
    fn derive(&self, index: u32, external: bool) -> Result<KeyPair, KeyError> {
        let mut material = self.seed.clone();
        material.push(external as u8);
        material.extend_from_slice(&index.to_le_bytes());
        KeyPair::from_secret_bytes(&sha256(&material))
    }
}

pub struct AddressManager {
    store: Arc<WalletStore>,
    deriver: Arc<dyn KeyDeriver>,
    address_version: u8,
}

impl AddressManager {
    pub fn new(store: Arc<WalletStore>, deriver: Arc<dyn KeyDeriver>, address_version: u8) -> Self {
        Self {
            store,
            deriver,
            address_version,
        }
    }

    /// Top up both chains so each has a full gap of unused keys
    pub fn fill_gap(&self) -> Result<(), KeyError> {
        self.extend_chain(true)?;
        self.extend_chain(false)
    }

    /// Next unused receiving address
    pub fn receive_address(&self) -> Result<String, KeyError> {
        self.first_unused(true).map(|key| key.address)
    }

    /// Next unused change address
    pub fn change_address(&self) -> Result<String, KeyError> {
        self.first_unused(false).map(|key| key.address)
    }

    /// Private material for a derived key
    pub fn key_pair_for(&self, index: u32, external: bool) -> Result<KeyPair, KeyError> {
        self.deriver.derive(index, external)
    }

    fn first_unused(&self, external: bool) -> Result<PublicKey, KeyError> {
        self.extend_chain(external)?;
        let used = self.used_key_hashes();
        self.store
            .public_keys()
            .into_iter()
            .filter(|key| key.external == external)
            .find(|key| !used.contains(&key.key_hash))
            .ok_or(KeyError::InvalidPublicKey)
    }

    fn extend_chain(&self, external: bool) -> Result<(), KeyError> {
        let used = self.used_key_hashes();
        let existing: Vec<PublicKey> = self
            .store
            .public_keys()
            .into_iter()
            .filter(|key| key.external == external)
            .collect();

        let unused = existing
            .iter()
            .filter(|key| !used.contains(&key.key_hash))
            .count() as u32;
        if unused >= GAP_LIMIT {
            return Ok(());
        }

        let next_index = existing.iter().map(|key| key.index + 1).max().unwrap_or(0);
        let mut fresh = Vec::new();
        for index in next_index..next_index + (GAP_LIMIT - unused) {
            let pair = self.deriver.derive(index, external)?;
            let key_hash = pair.key_hash().to_vec();
            fresh.push(PublicKey {
                index,
                external,
                raw: pair.public_key_bytes(),
                address: address_from_key_hash(&key_hash, self.address_version),
                key_hash,
            });
        }

        debug!(
            "extending {} chain with {} keys",
            if external { "external" } else { "internal" },
            fresh.len()
        );
        self.store.write(|writer| writer.add_public_keys(fresh));
        Ok(())
    }

    fn used_key_hashes(&self) -> HashSet<Vec<u8>> {
        self.store
            .transactions()
            .iter()
            .flat_map(|tx| tx.outputs.iter().filter_map(|o| o.key_hash.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Transaction, TransactionOutput, TransactionStatus};

    fn manager() -> (Arc<WalletStore>, AddressManager) {
        let store = Arc::new(WalletStore::new());
        let deriver = Arc::new(SeedKeyDeriver::new(b"test seed".to_vec()));
        (store.clone(), AddressManager::new(store, deriver, 0x6f))
    }

    #[test]
    fn test_fill_gap_populates_both_chains() {
        let (store, manager) = manager();
        manager.fill_gap().unwrap();

        let keys = store.public_keys();
        assert_eq!(keys.iter().filter(|k| k.external).count(), GAP_LIMIT as usize);
        assert_eq!(keys.iter().filter(|k| !k.external).count(), GAP_LIMIT as usize);
    }

    #[test]
    fn test_receive_address_is_stable_until_used() {
        let (_, manager) = manager();
        let first = manager.receive_address().unwrap();
        assert_eq!(manager.receive_address().unwrap(), first);
    }

    #[test]
    fn test_gap_refills_after_use() {
        let (store, manager) = manager();
        let address = manager.receive_address().unwrap();
        let used_key = store
            .public_keys()
            .into_iter()
            .find(|k| k.address == address)
            .unwrap();

        // Pay to the first key; the pool must advance past it
        let mut output = TransactionOutput::new(1_000, vec![], 0);
        output.key_hash = Some(used_key.key_hash.clone());
        store.write(|writer| {
            writer.insert_transaction(Transaction::new(
                1,
                vec![],
                vec![output],
                0,
                TransactionStatus::Relayed,
            ));
        });

        let next = manager.receive_address().unwrap();
        assert_ne!(next, address);

        let external_unused = store
            .public_keys()
            .iter()
            .filter(|k| k.external && k.key_hash != used_key.key_hash)
            .count();
        assert!(external_unused >= GAP_LIMIT as usize);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let deriver = SeedKeyDeriver::new(b"seed".to_vec());
        let a = deriver.derive(3, true).unwrap();
        let b = deriver.derive(3, true).unwrap();
        assert_eq!(a.public_key_bytes(), b.public_key_bytes());
        // Chains diverge
        let c = deriver.derive(3, false).unwrap();
        assert_ne!(a.public_key_bytes(), c.public_key_bytes());
    }
}
