//! Peer transport seam
//!
//! The wallet core drives sync through this trait; the concrete peer
//! connection (socket management, message framing, peer selection)
//! lives behind it.

use async_trait::async_trait;
use thiserror::Error;

use crate::core::BlockHeader;
use crate::crypto::Hash256;

#[derive(Error, Debug)]
pub enum PeerError {
    #[error("Not connected to any peer")]
    NotConnected,
    #[error("Peer request failed: {0}")]
    RequestFailed(String),
}

/// Outbound requests the sync layer makes of the peer network
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Request headers extending the chain described by `locator`,
    /// a list of recent block hashes newest first.
    async fn request_headers(&self, locator: Vec<Hash256>) -> Result<Vec<BlockHeader>, PeerError>;

    /// Announce a serialized transaction to the network
    async fn broadcast_transaction(&self, raw: Vec<u8>) -> Result<(), PeerError>;
}
