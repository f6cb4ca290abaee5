//! Base58Check address handling

use crate::crypto::{address_from_key_hash, double_sha256};
use crate::wallet::TransactionError;

const PAYLOAD_LEN: usize = 25;
const CHECKSUM_LEN: usize = 4;

/// Decodes and validates Base58Check addresses against a network's
/// version byte.
pub struct AddressConverter {
    version: u8,
}

impl AddressConverter {
    pub fn new(version: u8) -> Self {
        Self { version }
    }

    /// Decode an address to the key hash it commits to
    pub fn decode(&self, address: &str) -> Result<[u8; 20], TransactionError> {
        let payload = bs58::decode(address)
            .into_vec()
            .map_err(|_| TransactionError::InvalidAddress)?;
        if payload.len() != PAYLOAD_LEN {
            return Err(TransactionError::InvalidAddress);
        }

        let (body, checksum) = payload.split_at(PAYLOAD_LEN - CHECKSUM_LEN);
        if double_sha256(body).0[..CHECKSUM_LEN] != *checksum {
            return Err(TransactionError::InvalidAddress);
        }
        if body[0] != self.version {
            return Err(TransactionError::InvalidAddress);
        }

        let mut key_hash = [0u8; 20];
        key_hash.copy_from_slice(&body[1..]);
        Ok(key_hash)
    }

    pub fn encode(&self, key_hash: &[u8]) -> String {
        address_from_key_hash(key_hash, self.version)
    }

    pub fn is_valid(&self, address: &str) -> bool {
        self.decode(address).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let converter = AddressConverter::new(0x00);
        let key_hash = [0x5au8; 20];
        let address = converter.encode(&key_hash);
        assert_eq!(converter.decode(&address).unwrap(), key_hash);
        assert!(converter.is_valid(&address));
    }

    #[test]
    fn test_known_address() {
        // Genesis coinbase address
        let converter = AddressConverter::new(0x00);
        assert!(converter.is_valid("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"));
    }

    #[test]
    fn test_rejects_bad_checksum() {
        let converter = AddressConverter::new(0x00);
        assert!(!converter.is_valid("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNb"));
    }

    #[test]
    fn test_rejects_wrong_network() {
        let mainnet = AddressConverter::new(0x00);
        let testnet = AddressConverter::new(0x6f);
        let address = mainnet.encode(&[0x11u8; 20]);
        assert!(!testnet.is_valid(&address));
    }

    #[test]
    fn test_rejects_garbage() {
        let converter = AddressConverter::new(0x00);
        assert!(!converter.is_valid(""));
        assert!(!converter.is_valid("not an address 0OIl"));
    }
}
