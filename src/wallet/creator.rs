//! Spend creation
//!
//! Builds, persists, links and broadcasts a spend as one operation. The
//! wallet's own transaction is linked immediately so balance and
//! history reflect it without waiting for network relay.

use std::sync::Arc;

use log::info;

use crate::crypto::Hash256;
use crate::network::PeerTransport;
use crate::processing::TransactionLinker;
use crate::storage::WalletStore;
use crate::wallet::{AddressManager, SendError, TransactionBuilder};

pub struct TransactionCreator {
    store: Arc<WalletStore>,
    builder: TransactionBuilder,
    linker: TransactionLinker,
    manager: Arc<AddressManager>,
    transport: Arc<dyn PeerTransport>,
}

impl TransactionCreator {
    pub fn new(
        store: Arc<WalletStore>,
        builder: TransactionBuilder,
        linker: TransactionLinker,
        manager: Arc<AddressManager>,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        Self {
            store,
            builder,
            linker,
            manager,
            transport,
        }
    }

    /// Build and send a spend, returning its hash
    pub async fn create(
        &self,
        to_address: &str,
        value: u64,
        fee_rate: u64,
        sender_pays_fee: bool,
    ) -> Result<Hash256, SendError> {
        let transaction = self
            .builder
            .build(to_address, value, fee_rate, sender_pays_fee)?;
        let hash = transaction.hash;
        let raw = transaction.serialize();

        self.store
            .write(|writer| writer.insert_transaction(transaction));
        self.linker.run();

        self.transport.broadcast_transaction(raw).await?;
        info!("broadcast transaction {hash}");

        // The change key just got used; keep the look-ahead full
        self.manager.fill_gap().map_err(crate::wallet::TransactionError::from)?;
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::core::{
        BlockHeader, KeyId, ScriptType, Transaction, TransactionInput, TransactionOutput,
        TransactionStatus, SEQUENCE_FINAL,
    };
    use crate::network::PeerError;
    use crate::wallet::builder::ScriptBuilder;
    use crate::wallet::manager::KeyDeriver;
    use crate::wallet::{AddressConverter, SeedKeyDeriver, TransactionError};

    #[derive(Default)]
    struct RecordingPeer {
        broadcasts: Mutex<Vec<Vec<u8>>>,
        fail: bool,
    }

    #[async_trait]
    impl PeerTransport for RecordingPeer {
        async fn request_headers(
            &self,
            _locator: Vec<Hash256>,
        ) -> Result<Vec<BlockHeader>, PeerError> {
            Ok(vec![])
        }

        async fn broadcast_transaction(&self, raw: Vec<u8>) -> Result<(), PeerError> {
            if self.fail {
                return Err(PeerError::NotConnected);
            }
            self.broadcasts.lock().unwrap().push(raw);
            Ok(())
        }
    }

    fn creator_with_funds(peer: Arc<RecordingPeer>) -> (Arc<WalletStore>, Arc<AddressManager>, TransactionCreator) {
        let store = Arc::new(WalletStore::new());
        let deriver = Arc::new(SeedKeyDeriver::new(b"creator test".to_vec()));
        let manager = Arc::new(AddressManager::new(store.clone(), deriver.clone(), 0x6f));
        manager.fill_gap().unwrap();

        let pair = deriver.derive(0, true).unwrap();
        let mut key_hash = [0u8; 20];
        key_hash.copy_from_slice(&pair.key_hash());

        store.write(|writer| {
            let mut output =
                TransactionOutput::new(100_000, ScriptBuilder::p2pkh_lock_script(&key_hash), 0);
            output.script_type = ScriptType::P2pkh;
            output.key_hash = Some(key_hash.to_vec());
            output.owner = Some(KeyId {
                index: 0,
                external: true,
            });
            writer.insert_transaction(Transaction::new(
                1,
                vec![TransactionInput {
                    previous_output_hash: Hash256([0x01; 32]),
                    previous_output_index: 0,
                    signature_script: vec![],
                    sequence: SEQUENCE_FINAL,
                    spent_output: None,
                }],
                vec![output],
                0,
                TransactionStatus::Relayed,
            ));
        });

        let builder =
            TransactionBuilder::new(store.clone(), manager.clone(), AddressConverter::new(0x6f));
        let linker = TransactionLinker::new(store.clone(), 0x6f);
        let creator = TransactionCreator::new(
            store.clone(),
            builder,
            linker,
            manager.clone(),
            peer,
        );
        (store, manager, creator)
    }

    #[tokio::test]
    async fn test_create_stores_links_and_broadcasts() {
        let peer = Arc::new(RecordingPeer::default());
        let (store, manager, creator) = creator_with_funds(peer.clone());
        let destination = manager.receive_address().unwrap();
        let balance_before = store.balance();

        let hash = creator.create(&destination, 40_000, 1, true).await.unwrap();

        let stored = store.transaction(&hash).unwrap();
        assert_eq!(stored.status, TransactionStatus::New);
        // Linked right away: the spend consumes our output
        assert!(stored.is_mine);
        assert!(stored.inputs[0].spent_output.as_ref().unwrap().mine);
        // Balance dropped by the fee only (spend to our own address)
        assert!(store.balance() < balance_before);

        let broadcasts = peer.broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(broadcasts[0], stored.serialize());
    }

    #[tokio::test]
    async fn test_build_failure_broadcasts_nothing() {
        let peer = Arc::new(RecordingPeer::default());
        let (store, manager, creator) = creator_with_funds(peer.clone());
        let destination = manager.receive_address().unwrap();

        let err = creator
            .create(&destination, 10_000_000, 1, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SendError::Transaction(TransactionError::InsufficientFunds)
        ));
        assert!(peer.broadcasts.lock().unwrap().is_empty());
        // Only the funding transaction remains
        assert_eq!(store.transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_peer_failure_surfaces() {
        let peer = Arc::new(RecordingPeer {
            broadcasts: Mutex::new(Vec::new()),
            fail: true,
        });
        let (_, manager, creator) = creator_with_funds(peer);
        let destination = manager.receive_address().unwrap();

        let err = creator.create(&destination, 40_000, 1, true).await.unwrap_err();
        assert!(matches!(err, SendError::Peer(PeerError::NotConnected)));
    }
}
