use crate::core::monetary::conversions::checked_sum;
use crate::core::{TXInput, TXOutput, Transaction, TransactionData, TransactionType};
use crate::error::{Result, ValidationError};
use crate::storage::UnspentOutput;
use crate::utils::{random_id, DEFAULT_ID_LEN};
use log::warn;

/// Everything needed to spend `utxos`
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub utxos: Vec<UnspentOutput>,
    pub destination: String,
    pub amount: i64,
    pub change_address: String,
    pub fee: i64,
    /// Secret key owning every selected output
    pub secret: String,
}

/// Assembles and signs a regular transaction.
///
/// The whole selection is spent: `amount` goes to the destination, the fee is
/// left unclaimed and the rest returns to the change address. A selection
/// that leaves no positive change is refused.
pub fn build_transaction(request: TransferRequest) -> Result<Transaction> {
    if request.utxos.is_empty() {
        warn!("List of unspent outputs not provided");
        return Err(ValidationError::MissingField("utxos").into());
    }
    if request.destination.is_empty() {
        warn!("Destination address not provided");
        return Err(ValidationError::MissingField("destination").into());
    }
    if request.amount <= 0 {
        warn!("Transaction amount not provided");
        return Err(ValidationError::MissingField("amount").into());
    }

    let available = checked_sum(request.utxos.iter().map(|utxo| utxo.amount))?;
    let required = request
        .amount
        .checked_add(request.fee)
        .ok_or(ValidationError::AmountOverflow)?;
    let change = available
        .checked_sub(required)
        .ok_or(ValidationError::AmountOverflow)?;
    if change <= 0 {
        warn!("The sender does not have enough to pay for the transaction");
        return Err(ValidationError::InsufficientFunds {
            available,
            required,
        }
        .into());
    }
    if request.change_address.is_empty() {
        return Err(ValidationError::MissingField("change_address").into());
    }

    let mut inputs = Vec::with_capacity(request.utxos.len());
    for utxo in &request.utxos {
        let mut input = TXInput::new(&utxo.transaction, utxo.index, utxo.amount, &utxo.address);
        input.sign(&request.secret)?;
        inputs.push(input);
    }

    let outputs = vec![
        TXOutput::new(request.amount, &request.destination),
        TXOutput::new(change, &request.change_address),
    ];

    Transaction::new(
        &random_id(DEFAULT_ID_LEN),
        TransactionType::Regular,
        TransactionData { inputs, outputs },
    )
}
