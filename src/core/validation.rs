//! Consensus rules for blocks, chains and transactions
//!
//! Every check is a pure function of the candidate and a reference chain.
//! The first failing rule wins and nothing is mutated, so the ledger can run
//! these before touching its own state.

use crate::core::difficulty::{difficulty, proof_value};
use crate::core::monetary::conversions::checked_sum;
use crate::core::monetary::{FEE_PER_TRANSACTION, MINING_REWARD};
use crate::core::{Block, Transaction};
use crate::error::ValidationError;
use crate::storage::{unspent_outputs, UnspentOutput};
use log::warn;
use std::collections::{BTreeMap, HashMap};

type ValidationResult = std::result::Result<(), ValidationError>;

/// Checks `candidate` as the successor of `previous`.
///
/// `reference` is the chain the candidate would extend; its length drives the
/// difficulty lookup and its blocks are the history transactions are checked
/// against.
pub fn validate_block(candidate: &Block, previous: &Block, reference: &[Block]) -> ValidationResult {
    let expected_index = previous.get_index() + 1;
    if candidate.get_index() != expected_index {
        return Err(ValidationError::IndexMismatch {
            expected: expected_index,
            actual: candidate.get_index(),
        });
    }

    if candidate.get_previous_hash() != previous.get_hash() {
        return Err(ValidationError::ChainBreak {
            expected: previous.get_hash().to_string(),
            actual: candidate.get_previous_hash().to_string(),
        });
    }

    let recomputed = candidate.compute_hash().unwrap_or_default();
    if recomputed != candidate.get_hash() {
        return Err(ValidationError::HashMismatch {
            expected: recomputed,
            actual: candidate.get_hash().to_string(),
        });
    }

    let target = difficulty(reference.len(), Some(candidate.get_index()));
    let proof = proof_value(candidate.get_hash());
    if proof >= target {
        return Err(ValidationError::InsufficientWork { proof, target });
    }

    for transaction in candidate.get_transactions() {
        validate_transaction(transaction, reference)?;
    }

    let transactions = candidate.get_transactions();
    let reward_count = transactions.iter().filter(|tx| tx.is_reward()).count();

    // The reward only counts as an input when a reward transaction claims it
    let credited = if reward_count > 0 { MINING_REWARD } else { 0 };
    let mut input_amounts = Vec::new();
    let mut output_amounts = Vec::new();
    for tx in transactions {
        input_amounts.push(tx.input_sum()?);
        output_amounts.push(tx.output_sum()?);
    }
    let inputs = checked_sum(input_amounts.into_iter().chain(std::iter::once(credited)))?;
    let outputs = checked_sum(output_amounts)?;
    if inputs < outputs {
        return Err(ValidationError::BlockBalanceInvalid { inputs, outputs });
    }

    let mut spends: BTreeMap<(&str, u32), usize> = BTreeMap::new();
    for input in transactions.iter().flat_map(|tx| tx.get_inputs()) {
        *spends
            .entry((input.get_transaction(), input.get_index()))
            .or_insert(0) += 1;
    }
    let doubled: Vec<String> = spends
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((transaction, index), _)| format!("{transaction}:{index}"))
        .collect();
    if !doubled.is_empty() {
        return Err(ValidationError::DoubleSpendWithinBlock { outputs: doubled });
    }

    if reward_count > 1 {
        return Err(ValidationError::MultipleRewardTransactions {
            count: reward_count,
        });
    }

    Ok(())
}

/// Checks a whole chain from genesis.
///
/// Any broken link collapses to `InvalidSequence`; the underlying reason is
/// only logged.
pub fn validate_chain(candidate: &[Block]) -> ValidationResult {
    let Some(first) = candidate.first() else {
        return Err(ValidationError::GenesisMismatch);
    };
    match Block::genesis() {
        Ok(genesis) if &genesis == first => {}
        _ => return Err(ValidationError::GenesisMismatch),
    }

    for i in 1..candidate.len() {
        if let Err(reason) = validate_block(&candidate[i], &candidate[i - 1], &candidate[..i]) {
            warn!(
                "Candidate chain rejected at block {}: {reason}",
                candidate[i].get_index()
            );
            return Err(ValidationError::InvalidSequence);
        }
    }

    Ok(())
}

pub fn validate_transaction(tx: &Transaction, reference: &[Block]) -> ValidationResult {
    if tx.compute_hash().ok().as_deref() != Some(tx.get_hash()) {
        return Err(ValidationError::TransactionHashMismatch {
            id: tx.get_id().to_string(),
        });
    }

    if let Some(input) = tx.get_inputs().iter().find(|input| !input.verify_signature()) {
        return Err(ValidationError::InvalidInputSignature {
            transaction: input.get_transaction().to_string(),
            index: input.get_index(),
        });
    }

    if reference.iter().any(|block| block.contains_transaction(tx.get_id())) {
        return Err(ValidationError::DuplicateTransaction {
            id: tx.get_id().to_string(),
        });
    }

    if tx.is_reward() && !tx.get_inputs().is_empty() {
        return Err(ValidationError::RewardWithInputs {
            id: tx.get_id().to_string(),
        });
    }

    let inputs = tx.input_sum()?;
    let outputs = tx.output_sum()?;
    if !tx.is_reward() {
        if inputs < outputs {
            return Err(ValidationError::InsufficientBalance { inputs, outputs });
        }
        let fee = inputs - outputs;
        if fee < FEE_PER_TRANSACTION {
            return Err(ValidationError::InsufficientFee {
                expected: FEE_PER_TRANSACTION,
                actual: fee,
            });
        }
    }

    let negative = tx
        .get_outputs()
        .iter()
        .filter(|output| output.get_amount() < 0)
        .count();
    if negative > 0 {
        return Err(ValidationError::NegativeOutput { count: negative });
    }

    if tx.get_inputs().is_empty() {
        return Ok(());
    }

    for input in tx.get_inputs() {
        let spent = reference
            .iter()
            .flat_map(|block| block.get_transactions())
            .any(|committed| committed.spends(input.get_transaction(), input.get_index()));
        if spent {
            return Err(ValidationError::InputAlreadySpent {
                transaction: input.get_transaction().to_string(),
                index: input.get_index(),
            });
        }
    }

    // Every input must claim a committed output exactly as it was paid
    let unspent: HashMap<(String, u32), UnspentOutput> = unspent_outputs(reference, None)
        .into_iter()
        .map(|utxo| ((utxo.transaction.clone(), utxo.index), utxo))
        .collect();
    for input in tx.get_inputs() {
        let Some(output) = unspent.get(&input.outpoint()) else {
            return Err(ValidationError::UnknownInput {
                transaction: input.get_transaction().to_string(),
                index: input.get_index(),
            });
        };
        if output.address != input.get_address() || output.amount != input.get_amount() {
            return Err(ValidationError::InputMismatch {
                transaction: input.get_transaction().to_string(),
                index: input.get_index(),
            });
        }
    }

    Ok(())
}
