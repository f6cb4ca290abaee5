//! Transaction assembly and signing
//!
//! Builds legacy pay-to-key-hash spends: decode the destination, run
//! coin selection, lay out recipient and change outputs in that order,
//! then sign each input against the locking script it spends.

use std::sync::Arc;

use crate::core::{
    ScriptType, Transaction, TransactionInput, TransactionOutput, TransactionStatus,
    SEQUENCE_FINAL,
};
use crate::crypto::{double_sha256, KeyPair};
use crate::storage::WalletStore;
use crate::wallet::{
    AddressConverter, AddressManager, SelectedOutputs, TransactionError, UnspentOutputSelector,
};

/// Signature hash type covering all inputs and outputs
const SIGHASH_ALL: u32 = 0x01;

pub struct ScriptBuilder;

impl ScriptBuilder {
    /// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn p2pkh_lock_script(key_hash: &[u8; 20]) -> Vec<u8> {
        let mut script = Vec::with_capacity(25);
        script.extend_from_slice(&[0x76, 0xa9, 0x14]);
        script.extend_from_slice(key_hash);
        script.extend_from_slice(&[0x88, 0xac]);
        script
    }

    /// Unlocking script matching the spent output's type
    pub fn unlock_script(
        script_type: ScriptType,
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<Vec<u8>, TransactionError> {
        match script_type {
            ScriptType::P2pkh => {
                let mut script = Vec::with_capacity(2 + signature.len() + public_key.len());
                script.push(signature.len() as u8);
                script.extend_from_slice(signature);
                script.push(public_key.len() as u8);
                script.extend_from_slice(public_key);
                Ok(script)
            }
            ScriptType::P2pk => {
                let mut script = Vec::with_capacity(1 + signature.len());
                script.push(signature.len() as u8);
                script.extend_from_slice(signature);
                Ok(script)
            }
            ScriptType::Unknown => Err(TransactionError::UnsupportedScriptType),
        }
    }
}

/// Legacy SIGHASH_ALL input signing
pub struct InputSigner;

impl InputSigner {
    /// The digest input `index` commits to: the transaction with this
    /// input's script replaced by the spent locking script and every
    /// other script emptied, plus the hash type.
    pub fn signature_hash(
        transaction: &Transaction,
        index: usize,
        spent_locking_script: &[u8],
    ) -> [u8; 32] {
        let mut preimage = transaction.clone();
        for (i, input) in preimage.inputs.iter_mut().enumerate() {
            input.signature_script = if i == index {
                spent_locking_script.to_vec()
            } else {
                Vec::new()
            };
        }

        let mut bytes = preimage.serialize();
        bytes.extend_from_slice(&SIGHASH_ALL.to_le_bytes());
        double_sha256(&bytes).0
    }

    /// DER signature with the hash-type byte appended
    pub fn signature(
        key_pair: &KeyPair,
        transaction: &Transaction,
        index: usize,
        spent_locking_script: &[u8],
    ) -> Result<Vec<u8>, TransactionError> {
        let digest = Self::signature_hash(transaction, index, spent_locking_script);
        let mut signature = key_pair.sign(&digest)?;
        signature.push(SIGHASH_ALL as u8);
        Ok(signature)
    }
}

pub struct TransactionBuilder {
    store: Arc<WalletStore>,
    manager: Arc<AddressManager>,
    converter: AddressConverter,
    selector: UnspentOutputSelector,
}

impl TransactionBuilder {
    pub fn new(
        store: Arc<WalletStore>,
        manager: Arc<AddressManager>,
        converter: AddressConverter,
    ) -> Self {
        Self {
            store,
            manager,
            converter,
            selector: UnspentOutputSelector::new(),
        }
    }

    /// Fee a spend of `value` would pay, without building it
    pub fn fee(
        &self,
        value: u64,
        fee_rate: u64,
        sender_pays_fee: bool,
    ) -> Result<u64, TransactionError> {
        self.run_selection(value, fee_rate, sender_pays_fee)
            .map(|selection| selection.fee)
    }

    /// Build and sign a spend to `to_address`
    pub fn build(
        &self,
        to_address: &str,
        value: u64,
        fee_rate: u64,
        sender_pays_fee: bool,
    ) -> Result<Transaction, TransactionError> {
        let recipient_hash = self.converter.decode(to_address)?;
        let selection = self.run_selection(value, fee_rate, sender_pays_fee)?;

        let mut outputs = vec![TransactionOutput::new(
            selection.recipient_value,
            ScriptBuilder::p2pkh_lock_script(&recipient_hash),
            0,
        )];
        if let Some(change_value) = selection.change_value {
            let change_address = self.manager.change_address()?;
            let change_hash = self.converter.decode(&change_address)?;
            outputs.push(TransactionOutput::new(
                change_value,
                ScriptBuilder::p2pkh_lock_script(&change_hash),
                1,
            ));
        }

        let inputs = selection
            .outputs
            .iter()
            .map(|(outpoint, _)| TransactionInput {
                previous_output_hash: outpoint.tx_hash,
                previous_output_index: outpoint.index,
                signature_script: Vec::new(),
                sequence: SEQUENCE_FINAL,
                spent_output: None,
            })
            .collect();

        let unsigned = Transaction::new(1, inputs, outputs, 0, TransactionStatus::New);

        let mut scripts = Vec::with_capacity(selection.outputs.len());
        for (index, (_, spent)) in selection.outputs.iter().enumerate() {
            let owner = spent
                .owner
                .ok_or(TransactionError::UnsupportedScriptType)?;
            let key_pair = self.manager.key_pair_for(owner.index, owner.external)?;
            let signature =
                InputSigner::signature(&key_pair, &unsigned, index, &spent.locking_script)?;
            scripts.push(ScriptBuilder::unlock_script(
                spent.script_type,
                &signature,
                &key_pair.public_key_bytes(),
            )?);
        }

        let mut inputs = unsigned.inputs;
        for (input, script) in inputs.iter_mut().zip(scripts) {
            input.signature_script = script;
        }

        let mut signed = Transaction::new(
            unsigned.version,
            inputs,
            unsigned.outputs,
            unsigned.lock_time,
            TransactionStatus::New,
        );
        signed.is_mine = true;
        Ok(signed)
    }

    fn run_selection(
        &self,
        value: u64,
        fee_rate: u64,
        sender_pays_fee: bool,
    ) -> Result<SelectedOutputs, TransactionError> {
        self.selector.select(
            value,
            fee_rate,
            sender_pays_fee,
            ScriptType::P2pkh,
            self.store.unspent_outputs(),
        )
    }
}
