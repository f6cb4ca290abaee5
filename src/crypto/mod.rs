//! Cryptographic primitives: hashing, keys, and SPV merkle proofs

pub mod hash;
pub mod keys;
pub mod merkle;

pub use hash::{double_sha256, hash160, sha256, Hash256};
pub use keys::{address_from_key_hash, KeyError, KeyPair};
pub use merkle::{extract_matched_hashes, pair_hash, ProofError};
