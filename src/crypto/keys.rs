//! ECDSA key management
//!
//! Key pair handling, signing and verification on secp256k1, plus
//! Base58Check address derivation from public key hashes.

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::{double_sha256, hash160};

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its compressed public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from raw secret key bytes
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Compressed public key bytes (33 bytes)
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public_key.serialize().to_vec()
    }

    /// RIPEMD160(SHA256(pubkey)) key hash
    pub fn key_hash(&self) -> Vec<u8> {
        hash160(&self.public_key.serialize())
    }

    /// Sign a 32-byte message hash, returning a DER-encoded signature
    pub fn sign(&self, message_hash: &[u8; 32]) -> Result<Vec<u8>, KeyError> {
        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(message_hash)?;
        let signature = secp.sign_ecdsa(&message, &self.secret_key);
        Ok(signature.serialize_der().to_vec())
    }

    /// Verify a DER signature against this key pair's public key
    pub fn verify(&self, message_hash: &[u8; 32], signature: &[u8]) -> Result<bool, KeyError> {
        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(message_hash)?;
        let sig = secp256k1::ecdsa::Signature::from_der(signature)
            .map_err(|_| KeyError::InvalidSignature)?;
        Ok(secp.verify_ecdsa(&message, &sig, &self.public_key).is_ok())
    }
}

/// Base58Check-encode a key hash with the network's address version byte
pub fn address_from_key_hash(key_hash: &[u8], version: u8) -> String {
    let mut payload = Vec::with_capacity(25);
    payload.push(version);
    payload.extend_from_slice(key_hash);

    let checksum = double_sha256(&payload);
    payload.extend_from_slice(&checksum.0[..4]);

    bs58::encode(payload).into_string()
}
