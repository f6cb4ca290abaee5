//! Merkle-block message codec
//!
//! Wire layout: header (80B) || totalTransactions (u32 LE) ||
//! varint hash count || N x 32B hashes || varint flag byte count ||
//! flag bytes. Flag bits are packed least-significant-bit first.

use serde::{Deserialize, Serialize};

use crate::core::BlockHeader;
use crate::crypto::{extract_matched_hashes, Hash256, ProofError};
use crate::wire::{write_var_int, ByteReader, WireError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleBlockMessage {
    pub header: BlockHeader,
    /// Number of transactions in the block, including unmatched ones
    pub total_transactions: u32,
    /// Partial-tree node hashes in depth-first order
    pub hashes: Vec<Hash256>,
    pub flags: Vec<u8>,
}

impl MerkleBlockMessage {
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = self.header.serialize();
        buf.extend_from_slice(&self.total_transactions.to_le_bytes());
        write_var_int(&mut buf, self.hashes.len() as u64);
        for hash in &self.hashes {
            buf.extend_from_slice(&hash.0);
        }
        write_var_int(&mut buf, self.flags.len() as u64);
        buf.extend_from_slice(&self.flags);
        buf
    }

    pub fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let header = BlockHeader::deserialize(reader)?;
        let total_transactions = reader.read_u32_le()?;

        let hash_count = reader.read_var_int()?;
        let mut hashes = Vec::with_capacity(hash_count.min(4096) as usize);
        for _ in 0..hash_count {
            hashes.push(reader.read_hash()?);
        }

        let flag_count = reader.read_var_int()? as usize;
        let flags = reader.read_bytes(flag_count)?;

        Ok(Self {
            header,
            total_transactions,
            hashes,
            flags,
        })
    }

    /// Decode a complete message, rejecting trailing garbage
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        let mut reader = ByteReader::new(bytes);
        let message = Self::deserialize(&mut reader)?;
        if !reader.is_empty() {
            return Err(WireError::TrailingBytes);
        }
        Ok(message)
    }

    /// Verify the partial Merkle tree against this message's own header
    /// and return the proven transaction hashes.
    pub fn verified_transaction_hashes(&self) -> Result<Vec<Hash256>, ProofError> {
        extract_matched_hashes(
            self.total_transactions,
            &self.hashes,
            &self.flags,
            &self.header.merkle_root,
        )
    }
}
