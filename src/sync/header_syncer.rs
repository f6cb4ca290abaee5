//! Header download loop
//!
//! Repeatedly asks the peer for headers extending our chain head until
//! the peer has nothing newer. The block locator names our most recent
//! blocks so the peer can find the fork point, with the checkpoint as
//! the final anchor.

use std::sync::Arc;

use log::debug;

use crate::core::NetworkParams;
use crate::crypto::Hash256;
use crate::network::PeerTransport;
use crate::storage::WalletStore;
use crate::sync::{HeaderHandler, SyncError};

/// How many recent block hashes the locator carries
const LOCATOR_SIZE: usize = 10;

pub struct HeaderSyncer {
    store: Arc<WalletStore>,
    params: Arc<NetworkParams>,
    transport: Arc<dyn PeerTransport>,
    handler: HeaderHandler,
}

impl HeaderSyncer {
    pub fn new(
        store: Arc<WalletStore>,
        params: Arc<NetworkParams>,
        transport: Arc<dyn PeerTransport>,
        handler: HeaderHandler,
    ) -> Self {
        Self {
            store,
            params,
            transport,
            handler,
        }
    }

    /// Recent chain hashes newest first, anchored by the checkpoint
    pub fn locator(&self) -> Vec<Hash256> {
        let mut hashes = self.store.recent_block_hashes(LOCATOR_SIZE);
        if let Some(checkpoint) = &self.params.checkpoint {
            let checkpoint_hash = checkpoint.header.hash();
            if !hashes.contains(&checkpoint_hash) {
                hashes.push(checkpoint_hash);
            }
        }
        hashes
    }

    /// Pull headers until the peer runs dry
    pub async fn sync(&self) -> Result<(), SyncError> {
        loop {
            let headers = self.transport.request_headers(self.locator()).await?;
            if headers.is_empty() {
                debug!("header sync caught up");
                return Ok(());
            }
            self.handler.handle(headers)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::core::{Block, BlockHeader, Network};
    use crate::crypto::double_sha256;
    use crate::network::PeerError;
    use crate::validation::ValidatedBlockFactory;

    /// Serves a scripted sequence of header batches and records locators
    struct ScriptedPeer {
        batches: Mutex<Vec<Vec<BlockHeader>>>,
        locators: Mutex<Vec<Vec<Hash256>>>,
    }

    impl ScriptedPeer {
        fn new(mut batches: Vec<Vec<BlockHeader>>) -> Self {
            batches.reverse();
            Self {
                batches: Mutex::new(batches),
                locators: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PeerTransport for ScriptedPeer {
        async fn request_headers(
            &self,
            locator: Vec<Hash256>,
        ) -> Result<Vec<BlockHeader>, PeerError> {
            self.locators.lock().unwrap().push(locator);
            Ok(self.batches.lock().unwrap().pop().unwrap_or_default())
        }

        async fn broadcast_transaction(&self, _raw: Vec<u8>) -> Result<(), PeerError> {
            Ok(())
        }
    }

    fn header_chain(from: &Block, count: usize) -> Vec<BlockHeader> {
        let mut headers = Vec::new();
        let mut previous_hash = from.header_hash;
        let base = from.header.as_ref().unwrap();
        for i in 0..count {
            let header = BlockHeader {
                version: 1,
                previous_hash,
                merkle_root: double_sha256(&[i as u8, count as u8]),
                timestamp: base.timestamp + (i as u32 + 1) * 600,
                bits: base.bits,
                nonce: i as u32,
            };
            previous_hash = header.hash();
            headers.push(header);
        }
        headers
    }

    fn syncer_with(batches: Vec<Vec<BlockHeader>>) -> (Arc<WalletStore>, Arc<ScriptedPeer>, HeaderSyncer) {
        let store = Arc::new(WalletStore::new());
        let params = Arc::new(NetworkParams::for_network(Network::BitcoinRegTest));
        // Seed the checkpoint, as wallet start-up does before syncing
        store.write(|writer| writer.insert_block(params.checkpoint_block().unwrap()));
        let peer = Arc::new(ScriptedPeer::new(batches));
        let factory = ValidatedBlockFactory::new(store.clone(), params.clone());
        let handler = HeaderHandler::new(store.clone(), factory);
        let syncer = HeaderSyncer::new(store.clone(), params, peer.clone(), handler);
        (store, peer, syncer)
    }

    #[tokio::test]
    async fn test_sync_until_peer_runs_dry() {
        let params = NetworkParams::for_network(Network::BitcoinRegTest);
        let checkpoint = params.checkpoint_block().unwrap();

        let first = header_chain(&checkpoint, 3);
        let continuation_base =
            Block::from_header(first.last().unwrap().clone(), checkpoint.height + 3);
        let second = header_chain(&continuation_base, 2);

        let (store, peer, syncer) = syncer_with(vec![first, second]);
        syncer.sync().await.unwrap();

        assert_eq!(store.last_block().unwrap().height, checkpoint.height + 5);
        // Three requests: two with data, one empty terminator
        assert_eq!(peer.locators.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_locator_anchored_by_checkpoint() {
        let params = NetworkParams::for_network(Network::BitcoinRegTest);
        let checkpoint = params.checkpoint_block().unwrap();
        let checkpoint_hash = checkpoint.header_hash;

        let (store, _, syncer) = syncer_with(vec![]);

        // Fresh store: locator is just the checkpoint
        assert_eq!(syncer.locator(), vec![checkpoint_hash]);

        let head_chain = header_chain(&checkpoint, 12);
        store.write(|writer| {
            for (i, header) in head_chain.iter().enumerate() {
                writer.insert_block(Block::from_header(
                    header.clone(),
                    checkpoint.height + 1 + i as u64,
                ));
            }
        });

        let locator = syncer.locator();
        assert_eq!(locator.len(), LOCATOR_SIZE + 1);
        assert_eq!(locator[0], head_chain.last().unwrap().hash());
        assert_eq!(*locator.last().unwrap(), checkpoint_hash);
    }
}
