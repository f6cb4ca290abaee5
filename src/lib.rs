//! SPV Wallet: a light-client wallet core for Bitcoin-family chains
//!
//! This crate provides the validation and transaction-processing core of
//! an SPV wallet featuring:
//! - Header chain validation with pluggable difficulty rules (legacy
//!   2016-block retarget and Bitcoin-Cash style rolling window)
//! - Partial Merkle tree verification of block inclusion proofs
//! - UTXO tracking with automatic transaction linking and ownership
//!   detection
//! - Deterministic key pools with gap-limit look-ahead
//! - Coin selection, fee estimation and legacy transaction signing
//!   (secp256k1 ECDSA)
//! - Bit-exact wire codecs for headers, transactions and merkle blocks
//! - Typed change notifications for balance, history and sync progress
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use spv_wallet::storage::WalletStore;
//! use spv_wallet::wallet::{AddressManager, SeedKeyDeriver};
//!
//! // Derive a testnet receive address from a seed
//! let store = Arc::new(WalletStore::new());
//! let deriver = Arc::new(SeedKeyDeriver::new(b"example seed".to_vec()));
//! let manager = AddressManager::new(store, deriver, 0x6f);
//!
//! let address = manager.receive_address().unwrap();
//! println!("Receive at: {address}");
//! ```

pub mod api;
pub mod core;
pub mod crypto;
pub mod network;
pub mod processing;
pub mod storage;
pub mod sync;
pub mod validation;
pub mod wallet;
pub mod wire;

pub use wallet::SpvWallet;
