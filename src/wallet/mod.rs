//! Wallet-facing operations
//!
//! Address handling, coin selection, spend construction and the
//! [`SpvWallet`] facade tying the whole dependency graph together.

pub mod address;
pub mod builder;
pub mod creator;
pub mod kit;
pub mod manager;
pub mod selector;

pub use address::AddressConverter;
pub use builder::{InputSigner, ScriptBuilder, TransactionBuilder};
pub use creator::TransactionCreator;
pub use kit::{SpvWallet, TransactionInfo, WalletError, WalletEvent};
pub use manager::{AddressManager, KeyDeriver, SeedKeyDeriver, GAP_LIMIT};
pub use selector::{
    SelectedOutputs, TransactionSizeCalculator, UnspentOutputSelector, DUST_THRESHOLD,
};

use thiserror::Error;

use crate::crypto::KeyError;
use crate::network::PeerError;

/// Errors surfaced synchronously when building a spend. No partial
/// transaction is ever persisted or broadcast.
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Insufficient funds for the requested value and fee")]
    InsufficientFunds,
    #[error("Invalid destination address")]
    InvalidAddress,
    #[error("Cannot sign the referenced output's script type")]
    UnsupportedScriptType,
    #[error(transparent)]
    Key(#[from] KeyError),
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Peer(#[from] PeerError),
}
