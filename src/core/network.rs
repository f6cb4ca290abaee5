//! Per-network consensus parameters
//!
//! Each supported network carries a configuration struct selecting the
//! difficulty-adjustment strategy, the compact-target ceiling, address
//! version byte and the hard-coded checkpoint used to bootstrap the
//! chain without downloading all prior headers.

use serde::{Deserialize, Serialize};

use crate::core::block::{Block, BlockHeader, BlockStatus};
use crate::crypto::Hash256;

/// Supported chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    BitcoinMainNet,
    BitcoinTestNet,
    BitcoinRegTest,
    BitcoinCashMainNet,
    BitcoinCashTestNet,
}

/// Difficulty-adjustment strategy variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentRule {
    /// 2016-block retarget from the epoch boundary timespan
    Legacy,
    /// Bitcoin-Cash style rolling-window adjustment
    RollingWindow,
}

/// A trusted block the chain is bootstrapped from
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub header: BlockHeader,
    pub height: u64,
}

impl Checkpoint {
    /// The checkpoint as a stored chain block (already synced)
    pub fn block(&self) -> Block {
        let mut block = Block::from_header(self.header.clone(), self.height);
        block.status = BlockStatus::Synced;
        block
    }
}

/// Consensus configuration for one network
#[derive(Debug, Clone)]
pub struct NetworkParams {
    pub network: Network,
    /// Blocks between legacy difficulty adjustments
    pub height_interval: u64,
    /// Expected seconds per adjustment interval
    pub target_timespan: u32,
    /// Expected seconds per block
    pub target_spacing: u32,
    /// Compact encoding of the easiest allowed target
    pub max_target_bits: u32,
    /// Base58Check version byte for P2PKH addresses
    pub address_version: u8,
    pub adjustment: AdjustmentRule,
    pub checkpoint: Option<Checkpoint>,
}

impl NetworkParams {
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::BitcoinMainNet => Self {
                network,
                height_interval: 2016,
                target_timespan: 1_209_600,
                target_spacing: 600,
                max_target_bits: 0x1d00ffff,
                address_version: 0x00,
                adjustment: AdjustmentRule::Legacy,
                checkpoint: Some(Checkpoint {
                    header: mainnet_genesis(),
                    height: 0,
                }),
            },
            Network::BitcoinTestNet => Self {
                network,
                height_interval: 2016,
                target_timespan: 1_209_600,
                target_spacing: 600,
                max_target_bits: 0x1d00ffff,
                address_version: 0x6f,
                adjustment: AdjustmentRule::Legacy,
                checkpoint: Some(Checkpoint {
                    header: testnet_genesis(),
                    height: 0,
                }),
            },
            Network::BitcoinRegTest => Self {
                network,
                height_interval: 2016,
                target_timespan: 1_209_600,
                target_spacing: 600,
                max_target_bits: 0x207fffff,
                address_version: 0x6f,
                adjustment: AdjustmentRule::Legacy,
                checkpoint: Some(Checkpoint {
                    header: regtest_genesis(),
                    height: 0,
                }),
            },
            Network::BitcoinCashMainNet => Self {
                network,
                height_interval: 2016,
                target_timespan: 1_209_600,
                target_spacing: 600,
                max_target_bits: 0x1d00ffff,
                address_version: 0x00,
                adjustment: AdjustmentRule::RollingWindow,
                checkpoint: Some(Checkpoint {
                    header: mainnet_genesis(),
                    height: 0,
                }),
            },
            Network::BitcoinCashTestNet => Self {
                network,
                height_interval: 2016,
                target_timespan: 1_209_600,
                target_spacing: 600,
                max_target_bits: 0x1d00ffff,
                address_version: 0x6f,
                adjustment: AdjustmentRule::RollingWindow,
                checkpoint: Some(Checkpoint {
                    header: testnet_genesis(),
                    height: 0,
                }),
            },
        }
    }

    pub fn checkpoint_block(&self) -> Option<Block> {
        self.checkpoint.as_ref().map(|c| c.block())
    }
}

fn genesis_merkle_root() -> Hash256 {
    // Merkle root of the single coinbase in the Bitcoin genesis block
    Hash256::from_reversed_hex("4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b")
        .unwrap_or(Hash256::ZERO)
}

fn mainnet_genesis() -> BlockHeader {
    BlockHeader {
        version: 1,
        previous_hash: Hash256::ZERO,
        merkle_root: genesis_merkle_root(),
        timestamp: 1231006505,
        bits: 0x1d00ffff,
        nonce: 2083236893,
    }
}

fn testnet_genesis() -> BlockHeader {
    BlockHeader {
        version: 1,
        previous_hash: Hash256::ZERO,
        merkle_root: genesis_merkle_root(),
        timestamp: 1296688602,
        bits: 0x1d00ffff,
        nonce: 414098458,
    }
}

fn regtest_genesis() -> BlockHeader {
    BlockHeader {
        version: 1,
        previous_hash: Hash256::ZERO,
        merkle_root: genesis_merkle_root(),
        timestamp: 1296688602,
        bits: 0x207fffff,
        nonce: 2,
    }
}
