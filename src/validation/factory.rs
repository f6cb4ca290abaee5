//! Validated block construction
//!
//! Turns an incoming header into a stored-chain block: resolves the
//! predecessor (an explicit previous block, else the chain head, else
//! the network checkpoint), runs the header rule chain against it, and
//! only then mints the block one height above.

use std::sync::Arc;

use crate::core::{Block, BlockHeader, NetworkParams};
use crate::storage::WalletStore;
use crate::validation::{HeaderChainValidator, ValidationError};

pub struct ValidatedBlockFactory {
    store: Arc<WalletStore>,
    params: Arc<NetworkParams>,
    validator: HeaderChainValidator,
}

impl ValidatedBlockFactory {
    pub fn new(store: Arc<WalletStore>, params: Arc<NetworkParams>) -> Self {
        let validator = HeaderChainValidator::new(params.as_ref().clone());
        Self {
            store,
            params,
            validator,
        }
    }

    /// Validate `header` against the resolved predecessor and return the
    /// block extending it. The block is not persisted here.
    pub fn block_from_header(
        &self,
        header: BlockHeader,
        previous: Option<Block>,
    ) -> Result<Block, ValidationError> {
        let previous = match previous.or_else(|| self.store.last_block()) {
            Some(block) => block,
            None => self
                .params
                .checkpoint_block()
                .ok_or(ValidationError::NoCheckpointBlock)?,
        };

        let candidate = Block::from_header(header, previous.height + 1);
        self.validator
            .validate(&candidate, &previous, self.store.as_ref())?;
        Ok(candidate)
    }
}
