//! Block header validation
//!
//! A candidate header is checked against its immediate predecessor by an
//! ordered chain of rules; the first failing rule rejects the header.
//! Difficulty-adjustment heights additionally consult a block further
//! back in the chain through the [`BlockLookup`] seam, so the rules stay
//! testable without a real store.

pub mod difficulty;
pub mod factory;
pub mod rules;

pub use factory::ValidatedBlockFactory;
pub use rules::HeaderChainValidator;

use thiserror::Error;

use crate::core::Block;

/// Header/block validation errors. Fatal to the block being processed;
/// never retried automatically.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Block header missing")]
    NoHeader,
    #[error("Candidate does not extend the previous block")]
    InvalidChain,
    #[error("Difficulty bits differ from previous block")]
    NotEqualBits,
    #[error("Difficulty bits do not match the recomputed adjustment target")]
    NotDifficultyTransitionEqualBits,
    #[error("No previous block available for difficulty adjustment")]
    NoPreviousBlock,
    #[error("Network has no checkpoint block")]
    NoCheckpointBlock,
}

/// Chain-distance block lookup used by difficulty-adjustment rules
pub trait BlockLookup: Send + Sync {
    /// The block `steps` back along the stored chain from `block`
    fn block_back(&self, block: &Block, steps: u64) -> Option<Block>;
}
