//! Cryptographic hashing utilities for the wallet
//!
//! Provides the SHA-256 based hash functions used for block hashes,
//! transaction hashes and key hashes, plus the `Hash256` digest type.

use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
/// Used for block and transaction hashes in Bitcoin-style chains
pub fn double_sha256(data: &[u8]) -> Hash256 {
    let first = sha256(data);
    let second = sha256(&first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    Hash256(out)
}

/// Computes RIPEMD160(SHA256(data)), the standard public key hash
pub fn hash160(data: &[u8]) -> Vec<u8> {
    let sha = sha256(data);
    let mut ripemd = Ripemd160::new();
    ripemd.update(&sha);
    ripemd.finalize().to_vec()
}

/// A 32-byte digest in internal (wire) byte order.
///
/// Block and transaction hashes are conventionally displayed reversed,
/// so `Display` and the hex accessors reverse the bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Build from a slice; fails unless exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 32 {
            return None;
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        Some(Hash256(out))
    }

    /// Parse from display-order (reversed) hex
    pub fn from_reversed_hex(s: &str) -> Option<Self> {
        let mut bytes = hex::decode(s).ok()?;
        bytes.reverse();
        Self::from_slice(&bytes)
    }

    /// Display-order (reversed) hex string
    pub fn to_reversed_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        hex::encode(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_reversed_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_reversed_hex())
    }
}
