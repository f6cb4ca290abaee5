//! Locking-script classification
//!
//! Recognizes the two simple script templates the wallet can spend and
//! pulls out the key hash and Base58Check address for each output.
//! Anything else stays `Unknown` and is tracked but never selected.

use crate::core::{ScriptType, Transaction};
use crate::crypto::{address_from_key_hash, hash160};

// Script opcodes the templates are built from
const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;

const KEY_HASH_LEN: usize = 20;
const COMPRESSED_KEY_LEN: usize = 33;
const UNCOMPRESSED_KEY_LEN: usize = 65;

/// Classify a locking script and return its type with the key hash it
/// commits to, if any.
pub fn classify_script(script: &[u8]) -> (ScriptType, Option<Vec<u8>>) {
    // OP_DUP OP_HASH160 <20> hash OP_EQUALVERIFY OP_CHECKSIG
    if script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == KEY_HASH_LEN as u8
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
    {
        return (ScriptType::P2pkh, Some(script[3..23].to_vec()));
    }

    // <push pubkey> OP_CHECKSIG
    if script.len() >= 2 && script[script.len() - 1] == OP_CHECKSIG {
        let push_len = script[0] as usize;
        if (push_len == COMPRESSED_KEY_LEN || push_len == UNCOMPRESSED_KEY_LEN)
            && script.len() == push_len + 2
        {
            let pubkey = &script[1..1 + push_len];
            return (ScriptType::P2pk, Some(hash160(pubkey).to_vec()));
        }
    }

    (ScriptType::Unknown, None)
}

/// Fill in script type, key hash and address on every output
pub fn extract_outputs(tx: &mut Transaction, address_version: u8) {
    for output in &mut tx.outputs {
        let (script_type, key_hash) = classify_script(&output.locking_script);
        output.script_type = script_type;
        if let Some(key_hash) = key_hash {
            output.address = Some(address_from_key_hash(&key_hash, address_version));
            output.key_hash = Some(key_hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TransactionOutput, TransactionStatus};
    use crate::crypto::KeyPair;

    fn p2pkh_script(key_hash: &[u8]) -> Vec<u8> {
        let mut script = vec![OP_DUP, OP_HASH160, KEY_HASH_LEN as u8];
        script.extend_from_slice(key_hash);
        script.push(OP_EQUALVERIFY);
        script.push(OP_CHECKSIG);
        script
    }

    #[test]
    fn test_classify_p2pkh() {
        let key_hash = [0x11u8; 20];
        let (script_type, extracted) = classify_script(&p2pkh_script(&key_hash));
        assert_eq!(script_type, ScriptType::P2pkh);
        assert_eq!(extracted.unwrap(), key_hash.to_vec());
    }

    #[test]
    fn test_classify_p2pk() {
        let keys = KeyPair::generate();
        let pubkey = keys.public_key_bytes();
        let mut script = vec![pubkey.len() as u8];
        script.extend_from_slice(&pubkey);
        script.push(OP_CHECKSIG);

        let (script_type, extracted) = classify_script(&script);
        assert_eq!(script_type, ScriptType::P2pk);
        assert_eq!(extracted.unwrap(), keys.key_hash().to_vec());
    }

    #[test]
    fn test_classify_unknown() {
        // OP_RETURN data carrier
        let (script_type, extracted) = classify_script(&[0x6a, 0x04, 0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(script_type, ScriptType::Unknown);
        assert!(extracted.is_none());

        // Truncated P2PKH
        let key_hash = [0x11u8; 20];
        let mut short = p2pkh_script(&key_hash);
        short.pop();
        assert_eq!(classify_script(&short).0, ScriptType::Unknown);
    }

    #[test]
    fn test_extract_outputs_sets_address() {
        let key_hash = [0x22u8; 20];
        let mut tx = Transaction::new(
            1,
            vec![],
            vec![
                TransactionOutput::new(1_000, p2pkh_script(&key_hash), 0),
                TransactionOutput::new(2_000, vec![0x6a], 1),
            ],
            0,
            TransactionStatus::Relayed,
        );

        extract_outputs(&mut tx, 0x00);

        assert_eq!(tx.outputs[0].script_type, ScriptType::P2pkh);
        assert_eq!(tx.outputs[0].key_hash.as_deref(), Some(&key_hash[..]));
        assert_eq!(
            tx.outputs[0].address.as_deref(),
            Some(address_from_key_hash(&key_hash, 0x00).as_str())
        );
        assert_eq!(tx.outputs[1].script_type, ScriptType::Unknown);
        assert!(tx.outputs[1].address.is_none());
    }
}
