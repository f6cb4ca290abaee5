//! Incoming header batch handling
//!
//! Headers arrive in chain order. Each is validated against the block
//! built from the one before it; the valid prefix is persisted in a
//! single store transaction and the first failure, if any, is reported
//! after the prefix is saved.

use std::sync::Arc;

use log::{info, warn};

use crate::core::{Block, BlockHeader};
use crate::storage::WalletStore;
use crate::validation::{ValidatedBlockFactory, ValidationError};

pub struct HeaderHandler {
    store: Arc<WalletStore>,
    factory: ValidatedBlockFactory,
}

impl HeaderHandler {
    pub fn new(store: Arc<WalletStore>, factory: ValidatedBlockFactory) -> Self {
        Self { store, factory }
    }

    /// Validate and persist a batch of headers. An empty batch is a
    /// no-op, as is a batch arriving before bootstrap has seeded a
    /// chain head. Returns the validation error that cut the batch
    /// short, with everything before it already saved.
    pub fn handle(&self, headers: Vec<BlockHeader>) -> Result<(), ValidationError> {
        if headers.is_empty() {
            return Ok(());
        }
        let Some(head) = self.store.last_block() else {
            warn!("header batch dropped: no chain head to extend");
            return Ok(());
        };

        let mut previous: Option<Block> = Some(head);
        let mut validated: Vec<Block> = Vec::with_capacity(headers.len());
        let mut failure = None;

        for header in headers {
            match self.factory.block_from_header(header, previous.take()) {
                Ok(block) => {
                    previous = Some(block.clone());
                    validated.push(block);
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        if !validated.is_empty() {
            info!("storing {} validated headers", validated.len());
            self.store.write(|writer| {
                for block in validated {
                    writer.insert_block(block);
                }
            });
        }

        if let Some(err) = failure {
            warn!("header batch cut short: {err}");
            return Err(err);
        }
        Ok(())
    }
}
