//! Transaction entities and wire codec
//!
//! The UTXO transaction model: inputs referencing previous outputs,
//! outputs carrying locking scripts, plus the derived ownership state
//! the linker recomputes. Wire serialization covers exactly the
//! consensus fields; derived fields never hit the wire.

use serde::{Deserialize, Serialize};

use crate::crypto::{double_sha256, Hash256};
use crate::wire::{var_int_size, write_var_int, ByteReader, WireError};

/// Sequence number disabling replacement and locktime for an input
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

/// Relay status of a stored transaction. Monotonic: once Relayed a
/// transaction never returns to New.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Created locally, not yet seen from the network
    New,
    /// Observed from a peer (mempool or block)
    Relayed,
}

/// Reference to a specific output of a previous transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_hash: Hash256,
    pub index: u32,
}

/// Locking script classification. Only the simple single-key types are
/// recognized as spendable by this wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptType {
    /// Pay to public key: `<pubkey> OP_CHECKSIG`
    P2pk,
    /// Pay to public key hash: `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`
    P2pkh,
    /// Anything else; never part of the spendable set
    Unknown,
}

impl ScriptType {
    pub fn is_simple(&self) -> bool {
        matches!(self, ScriptType::P2pk | ScriptType::P2pkh)
    }
}

/// Identifies a wallet public key by derivation slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId {
    pub index: u32,
    /// External (receive) chain, or internal (change)
    pub external: bool,
}

/// Linker-resolved view of the output an input spends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentOutputRef {
    pub value: u64,
    pub address: Option<String>,
    pub mine: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub previous_output_hash: Hash256,
    pub previous_output_index: u32,
    /// Unlocking (signature) script
    pub signature_script: Vec<u8>,
    pub sequence: u32,
    /// Resolved by the linker once the referenced output is known
    pub spent_output: Option<SpentOutputRef>,
}

impl TransactionInput {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            tx_hash: self.previous_output_hash,
            index: self.previous_output_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutput {
    /// Value in minor units (satoshis)
    pub value: u64,
    pub locking_script: Vec<u8>,
    /// Position within the owning transaction
    pub index: u32,
    /// Derived: classification of the locking script
    pub script_type: ScriptType,
    /// Derived: recipient address, when the script type is recognized
    pub address: Option<String>,
    /// Derived: public key hash the script pays to
    pub key_hash: Option<Vec<u8>>,
    /// Derived: the wallet key controlling this output, if any
    pub owner: Option<KeyId>,
}

impl TransactionOutput {
    pub fn new(value: u64, locking_script: Vec<u8>, index: u32) -> Self {
        Self {
            value,
            locking_script,
            index,
            script_type: ScriptType::Unknown,
            address: None,
            key_hash: None,
            owner: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Double SHA-256 of the serialized transaction, cached
    pub hash: Hash256,
    pub version: i32,
    pub lock_time: u32,
    pub status: TransactionStatus,
    /// Derived: any input or output belongs to the wallet
    pub is_mine: bool,
    /// Confirming block, absent for mempool transactions
    pub block_hash: Option<Hash256>,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
}

impl Transaction {
    /// Assemble a transaction and compute its hash
    pub fn new(
        version: i32,
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
        lock_time: u32,
        status: TransactionStatus,
    ) -> Self {
        let mut tx = Self {
            hash: Hash256::ZERO,
            version,
            lock_time,
            status,
            is_mine: false,
            block_hash: None,
            inputs,
            outputs,
        };
        tx.hash = double_sha256(&tx.serialize());
        tx
    }

    /// Wire encoding: version, inputs, outputs, locktime
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.estimated_serialized_size());
        buf.extend_from_slice(&self.version.to_le_bytes());

        write_var_int(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(&input.previous_output_hash.0);
            buf.extend_from_slice(&input.previous_output_index.to_le_bytes());
            write_var_int(&mut buf, input.signature_script.len() as u64);
            buf.extend_from_slice(&input.signature_script);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_var_int(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            write_var_int(&mut buf, output.locking_script.len() as u64);
            buf.extend_from_slice(&output.locking_script);
        }

        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    /// Decode a network transaction. Status starts as Relayed since the
    /// bytes came from a peer; derived fields are left for the linker.
    pub fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let version = reader.read_i32_le()?;

        let input_count = reader.read_var_int()?;
        let mut inputs = Vec::with_capacity(input_count.min(1024) as usize);
        for _ in 0..input_count {
            let previous_output_hash = reader.read_hash()?;
            let previous_output_index = reader.read_u32_le()?;
            let script_len = reader.read_var_int()? as usize;
            let signature_script = reader.read_bytes(script_len)?;
            let sequence = reader.read_u32_le()?;
            inputs.push(TransactionInput {
                previous_output_hash,
                previous_output_index,
                signature_script,
                sequence,
                spent_output: None,
            });
        }

        let output_count = reader.read_var_int()?;
        let mut outputs = Vec::with_capacity(output_count.min(1024) as usize);
        for i in 0..output_count {
            let value = reader.read_u64_le()?;
            let script_len = reader.read_var_int()? as usize;
            let locking_script = reader.read_bytes(script_len)?;
            outputs.push(TransactionOutput::new(value, locking_script, i as u32));
        }

        let lock_time = reader.read_u32_le()?;

        Ok(Transaction::new(
            version,
            inputs,
            outputs,
            lock_time,
            TransactionStatus::Relayed,
        ))
    }

    fn estimated_serialized_size(&self) -> usize {
        let inputs: usize = self
            .inputs
            .iter()
            .map(|i| 40 + var_int_size(i.signature_script.len() as u64) + i.signature_script.len())
            .sum();
        let outputs: usize = self
            .outputs
            .iter()
            .map(|o| 8 + var_int_size(o.locking_script.len() as u64) + o.locking_script.len())
            .sum();
        8 + var_int_size(self.inputs.len() as u64)
            + var_int_size(self.outputs.len() as u64)
            + inputs
            + outputs
    }
}

/// A wallet-controlled public key, created ahead of use by the address
/// manager's look-ahead pool. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub index: u32,
    pub external: bool,
    /// Compressed public key bytes
    pub raw: Vec<u8>,
    /// RIPEMD160(SHA256(raw))
    pub key_hash: Vec<u8>,
    pub address: String,
}

impl PublicKey {
    pub fn key_id(&self) -> KeyId {
        KeyId {
            index: self.index,
            external: self.external,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transaction() -> Transaction {
        let input = TransactionInput {
            previous_output_hash: double_sha256(b"prev"),
            previous_output_index: 1,
            signature_script: vec![0x47, 0x01, 0x02],
            sequence: SEQUENCE_FINAL,
            spent_output: None,
        };
        let output = TransactionOutput::new(50_000, vec![0x76, 0xa9, 0x14], 0);
        Transaction::new(1, vec![input], vec![output], 0, TransactionStatus::New)
    }

    #[test]
    fn test_transaction_round_trip() {
        let tx = sample_transaction();
        let bytes = tx.serialize();

        let mut reader = ByteReader::new(&bytes);
        let decoded = Transaction::deserialize(&mut reader).unwrap();
        assert!(reader.is_empty());

        assert_eq!(decoded.hash, tx.hash);
        assert_eq!(decoded.version, tx.version);
        assert_eq!(decoded.lock_time, tx.lock_time);
        assert_eq!(decoded.inputs.len(), 1);
        assert_eq!(decoded.outputs.len(), 1);
        assert_eq!(decoded.inputs[0].signature_script, vec![0x47, 0x01, 0x02]);
        assert_eq!(decoded.outputs[0].value, 50_000);
        // Network transactions arrive already relayed
        assert_eq!(decoded.status, TransactionStatus::Relayed);
    }

    #[test]
    fn test_hash_changes_with_content() {
        let tx1 = sample_transaction();
        let mut tx2 = sample_transaction();
        tx2.outputs[0].value += 1;
        let tx2 = Transaction::new(
            tx2.version,
            tx2.inputs,
            tx2.outputs,
            tx2.lock_time,
            TransactionStatus::New,
        );
        assert_ne!(tx1.hash, tx2.hash);
    }

    #[test]
    fn test_truncated_transaction_rejected() {
        let bytes = sample_transaction().serialize();
        let mut reader = ByteReader::new(&bytes[..bytes.len() - 1]);
        assert!(Transaction::deserialize(&mut reader).is_err());
    }

    #[test]
    fn test_outpoint() {
        let tx = sample_transaction();
        let op = tx.inputs[0].outpoint();
        assert_eq!(op.tx_hash, tx.inputs[0].previous_output_hash);
        assert_eq!(op.index, 1);
    }
}
