//! Coin selection and fee estimation
//!
//! The size calculator carries a per-script byte-size model for legacy
//! transactions; the selector walks the spendable set largest-first
//! until the target plus estimated fee is covered. Change below the
//! dust threshold is folded into the fee instead of creating an output.

use crate::core::{OutPoint, ScriptType, TransactionOutput};
use crate::wallet::TransactionError;

/// Outputs smaller than this are uneconomical to spend
pub const DUST_THRESHOLD: u64 = 546;

const TRANSACTION_BASE_SIZE: usize = 10;
const P2PKH_INPUT_SIZE: usize = 148;
const P2PK_INPUT_SIZE: usize = 114;
const P2PKH_OUTPUT_SIZE: usize = 34;
const P2PK_OUTPUT_SIZE: usize = 44;

/// Byte-size model for legacy transactions
#[derive(Default)]
pub struct TransactionSizeCalculator;

impl TransactionSizeCalculator {
    pub fn input_size(&self, script_type: ScriptType) -> usize {
        match script_type {
            ScriptType::P2pk => P2PK_INPUT_SIZE,
            _ => P2PKH_INPUT_SIZE,
        }
    }

    pub fn output_size(&self, script_type: ScriptType) -> usize {
        match script_type {
            ScriptType::P2pk => P2PK_OUTPUT_SIZE,
            _ => P2PKH_OUTPUT_SIZE,
        }
    }

    pub fn transaction_size(&self, inputs: &[ScriptType], outputs: &[ScriptType]) -> usize {
        TRANSACTION_BASE_SIZE
            + inputs.iter().map(|t| self.input_size(*t)).sum::<usize>()
            + outputs.iter().map(|t| self.output_size(*t)).sum::<usize>()
    }
}

/// Result of a successful selection. Input values always cover
/// `recipient_value + change_value + fee` exactly.
#[derive(Debug, Clone)]
pub struct SelectedOutputs {
    pub outputs: Vec<(OutPoint, TransactionOutput)>,
    pub total_value: u64,
    pub recipient_value: u64,
    pub change_value: Option<u64>,
    pub fee: u64,
}

pub struct UnspentOutputSelector {
    calculator: TransactionSizeCalculator,
}

impl Default for UnspentOutputSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl UnspentOutputSelector {
    pub fn new() -> Self {
        Self {
            calculator: TransactionSizeCalculator,
        }
    }

    /// Select spendable outputs covering `target_value` at `fee_rate`
    /// satoshi per byte. When the sender pays the fee it is added on
    /// top of the target; otherwise it comes out of the recipient's
    /// value.
    pub fn select(
        &self,
        target_value: u64,
        fee_rate: u64,
        sender_pays_fee: bool,
        recipient_script: ScriptType,
        mut unspent: Vec<(OutPoint, TransactionOutput)>,
    ) -> Result<SelectedOutputs, TransactionError> {
        if target_value < DUST_THRESHOLD {
            return Err(TransactionError::InsufficientFunds);
        }

        // Largest-first keeps the input count, and thus the fee, small
        unspent.sort_by(|a, b| b.1.value.cmp(&a.1.value));

        let mut selected: Vec<(OutPoint, TransactionOutput)> = Vec::new();
        let mut input_types: Vec<ScriptType> = Vec::new();
        let mut total: u64 = 0;

        for (outpoint, output) in unspent {
            input_types.push(output.script_type);
            total += output.value;
            selected.push((outpoint, output));

            let fee_no_change = fee_rate
                * self
                    .calculator
                    .transaction_size(&input_types, &[recipient_script]) as u64;
            let required = if sender_pays_fee {
                target_value.saturating_add(fee_no_change)
            } else {
                target_value
            };
            if total < required {
                continue;
            }

            let fee_with_change = fee_rate
                * self
                    .calculator
                    .transaction_size(&input_types, &[recipient_script, ScriptType::P2pkh])
                    as u64;

            return if sender_pays_fee {
                let surplus = total - target_value;
                if surplus >= fee_with_change + DUST_THRESHOLD {
                    Ok(SelectedOutputs {
                        outputs: selected,
                        total_value: total,
                        recipient_value: target_value,
                        change_value: Some(surplus - fee_with_change),
                        fee: fee_with_change,
                    })
                } else {
                    // Sub-dust remainder goes to the miners
                    Ok(SelectedOutputs {
                        outputs: selected,
                        total_value: total,
                        recipient_value: target_value,
                        change_value: None,
                        fee: surplus,
                    })
                }
            } else {
                // Recipient pays the fee out of their value; any surplus
                // over the target is change or, below dust, extra fee
                let surplus = total - target_value;
                let (fee, change_value) = if surplus >= DUST_THRESHOLD {
                    (fee_with_change, Some(surplus))
                } else {
                    (fee_no_change + surplus, None)
                };
                let recipient_value = target_value
                    .checked_sub(fee)
                    .filter(|v| *v >= DUST_THRESHOLD)
                    .ok_or(TransactionError::InsufficientFunds)?;
                Ok(SelectedOutputs {
                    outputs: selected,
                    total_value: total,
                    recipient_value,
                    change_value,
                    fee,
                })
            };
        }

        Err(TransactionError::InsufficientFunds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Hash256;

    fn utxo(value: u64, seed: u8) -> (OutPoint, TransactionOutput) {
        let mut output = TransactionOutput::new(value, vec![], 0);
        output.script_type = ScriptType::P2pkh;
        (
            OutPoint {
                tx_hash: Hash256([seed; 32]),
                index: 0,
            },
            output,
        )
    }

    #[test]
    fn test_size_model() {
        let calc = TransactionSizeCalculator;
        // One P2PKH input, recipient plus change
        assert_eq!(
            calc.transaction_size(
                &[ScriptType::P2pkh],
                &[ScriptType::P2pkh, ScriptType::P2pkh]
            ),
            10 + 148 + 34 + 34
        );
        assert_eq!(calc.input_size(ScriptType::P2pk), 114);
        assert_eq!(calc.output_size(ScriptType::P2pk), 44);
    }

    #[test]
    fn test_largest_first_with_change() {
        let selector = UnspentOutputSelector::new();
        let unspent = vec![utxo(5_000, 1), utxo(100_000, 2), utxo(20_000, 3)];

        let selection = selector
            .select(30_000, 1, true, ScriptType::P2pkh, unspent)
            .unwrap();

        // The single 100k output suffices
        assert_eq!(selection.outputs.len(), 1);
        assert_eq!(selection.total_value, 100_000);
        assert_eq!(selection.recipient_value, 30_000);
        // size: 10 + 148 + 34 + 34 = 226
        assert_eq!(selection.fee, 226);
        assert_eq!(selection.change_value, Some(100_000 - 30_000 - 226));
        assert_eq!(
            selection.total_value,
            selection.recipient_value + selection.change_value.unwrap() + selection.fee
        );
    }

    #[test]
    fn test_accumulates_multiple_outputs() {
        let selector = UnspentOutputSelector::new();
        let unspent = vec![utxo(10_000, 1), utxo(9_000, 2), utxo(8_000, 3)];

        let selection = selector
            .select(17_000, 1, true, ScriptType::P2pkh, unspent)
            .unwrap();

        assert_eq!(selection.outputs.len(), 2);
        assert_eq!(selection.total_value, 19_000);
        // Removing either selected output breaks coverage
        assert!(selection.total_value - 9_000 < 17_000 + selection.fee);
    }

    #[test]
    fn test_sub_dust_change_folded_into_fee() {
        let selector = UnspentOutputSelector::new();
        // Surplus after the no-change fee is below dust
        let unspent = vec![utxo(30_400, 1)];

        let selection = selector
            .select(30_000, 1, true, ScriptType::P2pkh, unspent)
            .unwrap();

        assert_eq!(selection.change_value, None);
        assert_eq!(selection.fee, 400);
        assert_eq!(selection.recipient_value, 30_000);
    }

    #[test]
    fn test_recipient_pays_fee() {
        let selector = UnspentOutputSelector::new();
        let unspent = vec![utxo(50_000, 1)];

        let selection = selector
            .select(50_000, 1, false, ScriptType::P2pkh, unspent)
            .unwrap();

        // Whole balance sent: fee comes out of the recipient's value
        assert_eq!(selection.change_value, None);
        // size without change: 10 + 148 + 34 = 192
        assert_eq!(selection.fee, 192);
        assert_eq!(selection.recipient_value, 50_000 - 192);
    }

    #[test]
    fn test_recipient_pays_fee_with_change() {
        let selector = UnspentOutputSelector::new();
        let unspent = vec![utxo(100_000, 1)];

        let selection = selector
            .select(60_000, 1, false, ScriptType::P2pkh, unspent)
            .unwrap();

        assert_eq!(selection.fee, 226);
        assert_eq!(selection.recipient_value, 60_000 - 226);
        assert_eq!(selection.change_value, Some(40_000));
        // Inputs account for outputs plus fee exactly
        assert_eq!(
            selection.total_value,
            selection.recipient_value + selection.change_value.unwrap() + selection.fee
        );
    }

    #[test]
    fn test_insufficient_funds() {
        let selector = UnspentOutputSelector::new();
        let unspent = vec![utxo(1_000, 1), utxo(2_000, 2)];
        assert!(matches!(
            selector.select(10_000, 1, true, ScriptType::P2pkh, unspent),
            Err(TransactionError::InsufficientFunds)
        ));
    }

    #[test]
    fn test_dust_target_rejected() {
        let selector = UnspentOutputSelector::new();
        assert!(matches!(
            selector.select(100, 1, true, ScriptType::P2pkh, vec![utxo(50_000, 1)]),
            Err(TransactionError::InsufficientFunds)
        ));
    }
}
