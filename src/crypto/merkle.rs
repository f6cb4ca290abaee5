//! Partial Merkle tree verification for SPV proofs
//!
//! A merkle-block message carries a pruned Merkle tree: a depth-first
//! list of node hashes plus one flag bit per visited node. Reconstructing
//! the tree bottom-up and comparing the computed root against the block
//! header's Merkle root proves which transactions the block includes.
//! Accepting any transaction from a proof that does not recompute to the
//! header root would let a peer forge confirmations, so a failed proof
//! rejects the whole batch.

use thiserror::Error;

use super::hash::{double_sha256, Hash256};

/// Merkle proof verification errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error("Computed merkle root does not match block header")]
    MerkleRootMismatch,
    #[error("Malformed partial merkle tree: {0}")]
    Malformed(&'static str),
    #[error("Transaction not covered by merkle proof: {0}")]
    UnprovenTransaction(Hash256),
}

/// Verifies a partial Merkle tree and returns the matched transaction
/// hashes, in tree (block) order.
///
/// `total_transactions` is the full transaction count of the block,
/// `hashes` the depth-first node hashes, and `flags` the per-node
/// inclusion bits packed least-significant-bit first.
pub fn extract_matched_hashes(
    total_transactions: u32,
    hashes: &[Hash256],
    flags: &[u8],
    merkle_root: &Hash256,
) -> Result<Vec<Hash256>, ProofError> {
    if total_transactions == 0 {
        return Err(ProofError::Malformed("zero transactions"));
    }
    if total_transactions > MAX_TRANSACTIONS {
        return Err(ProofError::Malformed("transaction count too large"));
    }
    if hashes.is_empty() {
        return Err(ProofError::Malformed("empty hash list"));
    }
    if hashes.len() as u64 > total_transactions as u64 {
        return Err(ProofError::Malformed("more hashes than transactions"));
    }

    let mut height = 0u32;
    while tree_width(total_transactions, height) > 1 {
        height += 1;
    }

    let mut cursor = Cursor {
        total: total_transactions,
        hashes,
        flags,
        bit_pos: 0,
        hash_pos: 0,
        matched: Vec::new(),
    };

    let root = cursor.traverse(height, 0)?;

    if cursor.hash_pos != hashes.len() {
        return Err(ProofError::Malformed("unconsumed hashes"));
    }
    // All flag bytes must be used, with only zero padding left over
    if (cursor.bit_pos + 7) / 8 != flags.len() {
        return Err(ProofError::Malformed("unconsumed flag bits"));
    }
    for bit in cursor.bit_pos..flags.len() * 8 {
        if flags[bit / 8] & (1 << (bit % 8)) != 0 {
            return Err(ProofError::Malformed("non-zero padding bits"));
        }
    }

    if root != *merkle_root {
        return Err(ProofError::MerkleRootMismatch);
    }

    Ok(cursor.matched)
}

/// No block can hold more transactions than its size divided by the
/// smallest possible transaction; 32 MB covers the largest supported
/// network. The count comes straight off the wire, so it is bounded
/// before any tree arithmetic.
const MAX_TRANSACTIONS: u32 = 32_000_000 / 60;

/// Number of nodes at the given height of a tree over `total` leaves
fn tree_width(total: u32, height: u32) -> u64 {
    (u64::from(total) + (1u64 << height) - 1) >> height
}

struct Cursor<'a> {
    total: u32,
    hashes: &'a [Hash256],
    flags: &'a [u8],
    bit_pos: usize,
    hash_pos: usize,
    matched: Vec<Hash256>,
}

impl Cursor<'_> {
    fn next_bit(&mut self) -> Result<bool, ProofError> {
        if self.bit_pos >= self.flags.len() * 8 {
            return Err(ProofError::Malformed("flag bits exhausted"));
        }
        let bit = self.flags[self.bit_pos / 8] & (1 << (self.bit_pos % 8)) != 0;
        self.bit_pos += 1;
        Ok(bit)
    }

    fn next_hash(&mut self) -> Result<Hash256, ProofError> {
        let hash = self
            .hashes
            .get(self.hash_pos)
            .copied()
            .ok_or(ProofError::Malformed("hash list exhausted"))?;
        self.hash_pos += 1;
        Ok(hash)
    }

    fn traverse(&mut self, height: u32, pos: u64) -> Result<Hash256, ProofError> {
        let flag = self.next_bit()?;

        if height == 0 || !flag {
            // Leaf, or pruned subtree supplied as a single hash
            let hash = self.next_hash()?;
            if height == 0 && flag {
                self.matched.push(hash);
            }
            return Ok(hash);
        }

        let left = self.traverse(height - 1, pos * 2)?;
        let right = if pos * 2 + 1 < tree_width(self.total, height - 1) {
            let right = self.traverse(height - 1, pos * 2 + 1)?;
            // Identical children would allow mutated trees with the same root
            if right == left {
                return Err(ProofError::Malformed("duplicate child hashes"));
            }
            right
        } else {
            // Odd node count at this level: the last child is paired with itself
            left
        };

        Ok(pair_hash(&left, &right))
    }
}

/// Hash of two concatenated child nodes
pub fn pair_hash(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(&left.0);
    data[32..].copy_from_slice(&right.0);
    double_sha256(&data)
}
