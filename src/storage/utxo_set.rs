// Unspent outputs are derived by scanning the committed chain; nothing is indexed.

use crate::core::monetary::conversions::checked_sum;
use crate::core::Block;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Output not referenced by any committed input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub transaction: String,
    pub index: u32,
    pub amount: i64,
    pub address: String,
}

/// Unspent outputs in chain order, optionally restricted to one address
pub fn unspent_outputs(blocks: &[Block], address: Option<&str>) -> Vec<UnspentOutput> {
    let matches = |candidate: &str| address.map_or(true, |wanted| wanted == candidate);

    let mut outputs = Vec::new();
    let mut spent: HashSet<(&str, u32)> = HashSet::new();
    for tx in blocks.iter().flat_map(|block| block.get_transactions()) {
        for (index, output) in tx.get_outputs().iter().enumerate() {
            if matches(output.get_address()) {
                outputs.push(UnspentOutput {
                    transaction: tx.get_id().to_string(),
                    index: index as u32,
                    amount: output.get_amount(),
                    address: output.get_address().to_string(),
                });
            }
        }
        for input in tx.get_inputs() {
            if matches(input.get_address()) {
                spent.insert((input.get_transaction(), input.get_index()));
            }
        }
    }

    outputs
        .into_iter()
        .filter(|utxo| !spent.contains(&(utxo.transaction.as_str(), utxo.index)))
        .collect()
}

/// Sum of the address's unspent outputs; `AmountOverflow` past `i64::MAX`
pub fn balance(blocks: &[Block], address: &str) -> Result<i64, ValidationError> {
    checked_sum(
        unspent_outputs(blocks, Some(address))
            .iter()
            .map(|utxo| utxo.amount),
    )
}
