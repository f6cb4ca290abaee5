//! Persistence layer

pub mod store;

pub use store::{ChangeSet, StoreEvent, StoreWriter, WalletStore};
