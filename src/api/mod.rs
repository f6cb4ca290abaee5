//! Bootstrap index client
//!
//! An HTTP index maps addresses to the block hashes that touch them,
//! letting a fresh wallet skip downloading transactions for blocks that
//! cannot be relevant. A 404 means the index has never seen the
//! address, which is an empty answer, not a failure.

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::crypto::Hash256;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No connection to the bootstrap index")]
    NoConnection,
    #[error("Bootstrap index returned status {status}")]
    ServerError { status: u16 },
    #[error("Could not map bootstrap index response")]
    MappingError,
}

/// Bootstrap lookups the wallet start-up path depends on
#[async_trait]
pub trait BlockHashFetcher: Send + Sync {
    /// Hashes and heights of blocks containing transactions that touch
    /// `address`
    async fn block_hashes(&self, address: &str) -> Result<Vec<(Hash256, u64)>, ApiError>;
}

#[derive(Deserialize)]
struct BlockHashIndex {
    blocks: Vec<BlockHashItem>,
}

#[derive(Deserialize)]
struct BlockHashItem {
    hash: String,
    height: u64,
}

pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl BlockHashFetcher for ApiClient {
    async fn block_hashes(&self, address: &str) -> Result<Vec<(Hash256, u64)>, ApiError> {
        let url = format!("{}/{}/index.json", self.base_url, address_path(address)?);
        debug!("bootstrap lookup {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|_| ApiError::NoConnection)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(ApiError::ServerError {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|_| ApiError::MappingError)?;
        parse_block_hashes(&body)
    }
}

/// Addresses are sharded into the index's directory layout by their
/// first two three-character chunks
fn address_path(address: &str) -> Result<String, ApiError> {
    if address.len() < 7 || !address.is_ascii() {
        return Err(ApiError::MappingError);
    }
    Ok(format!(
        "{}/{}/{}",
        &address[..3],
        &address[3..6],
        &address[6..]
    ))
}

fn parse_block_hashes(body: &str) -> Result<Vec<(Hash256, u64)>, ApiError> {
    let index: BlockHashIndex = serde_json::from_str(body).map_err(|_| ApiError::MappingError)?;
    index
        .blocks
        .into_iter()
        .map(|item| {
            let hash = Hash256::from_reversed_hex(&item.hash).ok_or(ApiError::MappingError)?;
            Ok((hash, item.height))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_path_sharding() {
        assert_eq!(
            address_path("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa").unwrap(),
            "1A1/zP1/eP5QGefi2DMPTfTL5SLmv7DivfNa"
        );
    }

    #[test]
    fn test_address_path_rejects_short_input() {
        assert!(address_path("1A1zP").is_err());
    }

    #[test]
    fn test_parse_block_hashes() {
        let body = r#"{"blocks": [
            {"hash": "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f", "height": 0},
            {"hash": "000000000933ea01ad0ee984209779baaec3ced90fa3f408719526f8d77f4943", "height": 1}
        ]}"#;

        let parsed = parse_block_hashes(body).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(
            parsed[0].0.to_reversed_hex(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
        assert_eq!(parsed[1].1, 1);
    }

    #[test]
    fn test_parse_rejects_bad_hash() {
        let body = r#"{"blocks": [{"hash": "not hex", "height": 0}]}"#;
        assert!(matches!(
            parse_block_hashes(body),
            Err(ApiError::MappingError)
        ));
    }
}
