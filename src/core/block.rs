//! Block and block header entities
//!
//! A `BlockHeader` is the 80-byte consensus structure; a `Block` is the
//! stored chain entity wrapping it with height, sync status and the
//! cached header hash.

use serde::{Deserialize, Serialize};

use crate::crypto::{double_sha256, Hash256};
use crate::wire::{ByteReader, WireError};

/// Serialized block header size in bytes
pub const BLOCK_HEADER_SIZE: usize = 80;

/// The 80-byte block header. Immutable once accepted; its hash is the
/// double SHA-256 of the serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    /// Hash of the previous block's header
    pub previous_hash: Hash256,
    /// Merkle root over the block's transaction hashes
    pub merkle_root: Hash256,
    pub timestamp: u32,
    /// Compact-encoded difficulty target
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    /// Wire encoding: version, prevHash, merkleRoot, timestamp, bits,
    /// nonce, all little-endian fixed width
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(BLOCK_HEADER_SIZE);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.previous_hash.0);
        buf.extend_from_slice(&self.merkle_root.0);
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.bits.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf
    }

    pub fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            version: reader.read_i32_le()?,
            previous_hash: reader.read_hash()?,
            merkle_root: reader.read_hash()?,
            timestamp: reader.read_u32_le()?,
            bits: reader.read_u32_le()?,
            nonce: reader.read_u32_le()?,
        })
    }

    /// Double SHA-256 of the serialized header
    pub fn hash(&self) -> Hash256 {
        double_sha256(&self.serialize())
    }
}

/// Sync status of a stored block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockStatus {
    /// Header accepted, transactions not yet requested
    Pending,
    /// Merkle block requested from a peer
    Syncing,
    /// Transactions received and processed
    Synced,
}

/// A block in the locally-trusted chain.
///
/// Non-archived blocks form a single unbroken chain from the checkpoint
/// to the head, heights strictly increasing by one. Archived blocks are
/// header-only (or hash-only) ancestors kept for chain linkage; bootstrap
/// seeding stores them without a header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: Option<BlockHeader>,
    /// Cached hash of the header, computed once at construction
    pub header_hash: Hash256,
    pub height: u64,
    pub status: BlockStatus,
    pub archived: bool,
}

impl Block {
    /// Chain block materialized from a validated header
    pub fn from_header(header: BlockHeader, height: u64) -> Self {
        let header_hash = header.hash();
        Self {
            header: Some(header),
            header_hash,
            height,
            status: BlockStatus::Pending,
            archived: false,
        }
    }

    /// Hash-only ancestor seeded from the bootstrap index
    pub fn archived_placeholder(header_hash: Hash256, height: u64) -> Self {
        Self {
            header: None,
            header_hash,
            height,
            status: BlockStatus::Pending,
            archived: true,
        }
    }

    pub fn bits(&self) -> Option<u32> {
        self.header.as_ref().map(|h| h.bits)
    }

    pub fn timestamp(&self) -> Option<u32> {
        self.header.as_ref().map(|h| h.timestamp)
    }
}
