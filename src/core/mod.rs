//! Core domain entities: blocks, transactions, keys, network parameters

pub mod block;
pub mod network;
pub mod transaction;

pub use block::{Block, BlockHeader, BlockStatus, BLOCK_HEADER_SIZE};
pub use network::{AdjustmentRule, Checkpoint, Network, NetworkParams};
pub use transaction::{
    KeyId, OutPoint, PublicKey, ScriptType, SpentOutputRef, Transaction, TransactionInput,
    TransactionOutput, TransactionStatus, SEQUENCE_FINAL,
};
