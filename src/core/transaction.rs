// Value-transfer transactions: inputs spend earlier outputs, outputs lock value to a public key.
// The JSON shape of these structs is the wire format and the hash input, so field order is fixed.

use crate::core::monetary::conversions::checked_sum;
use crate::error::{Result, ValidationError};
use crate::utils::{hash, hash_json, random_id, sign, to_canonical_json, DEFAULT_ID_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Regular,
    Reward,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Regular => "regular",
            TransactionType::Reward => "reward",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The part of an input covered by its signature
#[derive(Serialize)]
struct SignedReference<'a> {
    transaction: &'a str,
    index: u32,
    address: &'a str,
}

// Spends output `index` of transaction `transaction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TXInput {
    transaction: String,
    index: u32,
    amount: i64,
    address: String,
    signature: String,
}

impl TXInput {
    /// Unsigned input; `sign` fills the signature in
    pub fn new(transaction: &str, index: u32, amount: i64, address: &str) -> TXInput {
        TXInput {
            transaction: transaction.to_string(),
            index,
            amount,
            address: address.to_string(),
            signature: String::new(),
        }
    }

    /// Digest the spender signs: SHA-256 of `{transaction, index, address}`
    pub fn signing_hash(&self) -> Result<String> {
        hash_json(&SignedReference {
            transaction: &self.transaction,
            index: self.index,
            address: &self.address,
        })
    }

    pub fn sign(&mut self, secret_key: &str) -> Result<()> {
        let digest = self.signing_hash()?;
        self.signature = sign(secret_key, &digest)?;
        Ok(())
    }

    pub fn verify_signature(&self) -> bool {
        match self.signing_hash() {
            Ok(digest) => crate::utils::verify(&self.address, &self.signature, &digest),
            Err(_) => false,
        }
    }

    /// `(transaction, index)` key used for spent-output bookkeeping
    pub fn outpoint(&self) -> (String, u32) {
        (self.transaction.clone(), self.index)
    }

    pub fn get_transaction(&self) -> &str {
        self.transaction.as_str()
    }

    pub fn get_index(&self) -> u32 {
        self.index
    }

    pub fn get_amount(&self) -> i64 {
        self.amount
    }

    pub fn get_address(&self) -> &str {
        self.address.as_str()
    }

    pub fn get_signature(&self) -> &str {
        self.signature.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TXOutput {
    amount: i64,
    address: String,
}

impl TXOutput {
    pub fn new(amount: i64, address: &str) -> TXOutput {
        TXOutput {
            amount,
            address: address.to_string(),
        }
    }

    pub fn get_amount(&self) -> i64 {
        self.amount
    }

    pub fn get_address(&self) -> &str {
        self.address.as_str()
    }

    pub fn is_locked_with(&self, address: &str) -> bool {
        self.address == address
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    pub inputs: Vec<TXInput>,
    pub outputs: Vec<TXOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: String,
    hash: String,
    #[serde(rename = "type")]
    tx_type: TransactionType,
    data: TransactionData,
}

impl Transaction {
    /// Builds a transaction and stamps its hash
    pub fn new(id: &str, tx_type: TransactionType, data: TransactionData) -> Result<Transaction> {
        let mut tx = Transaction {
            id: id.to_string(),
            hash: String::new(),
            tx_type,
            data,
        };
        tx.hash = tx.compute_hash()?;
        Ok(tx)
    }

    /// Input-less transaction paying `amount` to the block producer
    pub fn new_reward(address: &str, amount: i64) -> Result<Transaction> {
        let data = TransactionData {
            inputs: vec![],
            outputs: vec![TXOutput::new(amount, address)],
        };
        Self::new(&random_id(DEFAULT_ID_LEN), TransactionType::Reward, data)
    }

    /// SHA-256 of `id ∥ type ∥ canonical-JSON(data)`
    pub fn compute_hash(&self) -> Result<String> {
        let data = to_canonical_json(&self.data)?;
        Ok(hash(&format!("{}{}{}", self.id, self.tx_type, data)))
    }

    pub fn is_reward(&self) -> bool {
        self.tx_type == TransactionType::Reward
    }

    pub fn get_id(&self) -> &str {
        self.id.as_str()
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn get_type(&self) -> TransactionType {
        self.tx_type
    }

    pub fn get_inputs(&self) -> &[TXInput] {
        self.data.inputs.as_slice()
    }

    pub fn get_outputs(&self) -> &[TXOutput] {
        self.data.outputs.as_slice()
    }

    pub fn input_sum(&self) -> std::result::Result<i64, ValidationError> {
        checked_sum(self.data.inputs.iter().map(TXInput::get_amount))
    }

    pub fn output_sum(&self) -> std::result::Result<i64, ValidationError> {
        checked_sum(self.data.outputs.iter().map(TXOutput::get_amount))
    }

    /// Whether an input of this transaction spends `(transaction, index)`
    pub fn spends(&self, transaction: &str, index: u32) -> bool {
        self.data
            .inputs
            .iter()
            .any(|input| input.transaction == transaction && input.index == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{derive_secret, from_json, generate_keypair};

    fn signed_input() -> (TXInput, String) {
        let keys = generate_keypair(&derive_secret("input-owner")).unwrap();
        let mut input = TXInput::new(&"ab".repeat(32), 0, 100, &keys.public_key);
        input.sign(&keys.secret_key).unwrap();
        (input, keys.public_key)
    }

    #[test]
    fn test_wire_field_order() {
        let tx = Transaction::new(
            "id",
            TransactionType::Regular,
            TransactionData {
                inputs: vec![],
                outputs: vec![TXOutput::new(5, "addr")],
            },
        )
        .unwrap();
        let json = to_canonical_json(&tx).unwrap();
        let expected_prefix = format!("{{\"id\":\"id\",\"hash\":\"{}\",\"type\":\"regular\"", tx.get_hash());
        assert!(json.starts_with(&expected_prefix));
        assert!(json.ends_with(r#""data":{"inputs":[],"outputs":[{"amount":5,"address":"addr"}]}}"#));
    }

    #[test]
    fn test_hash_covers_id_type_and_data() {
        let data = TransactionData::default();
        let regular = Transaction::new("same", TransactionType::Regular, data.clone()).unwrap();
        let reward = Transaction::new("same", TransactionType::Reward, data).unwrap();
        assert_ne!(regular.get_hash(), reward.get_hash());
        assert_eq!(
            regular.get_hash(),
            hash(r#"sameregular{"inputs":[],"outputs":[]}"#)
        );
    }

    #[test]
    fn test_json_round_trip_preserves_hash() {
        let (input, owner) = signed_input();
        let tx = Transaction::new(
            &random_id(DEFAULT_ID_LEN),
            TransactionType::Regular,
            TransactionData {
                inputs: vec![input],
                outputs: vec![TXOutput::new(90, &owner)],
            },
        )
        .unwrap();

        let json = to_canonical_json(&tx).unwrap();
        let back: Transaction = from_json(&json).unwrap();
        assert_eq!(back, tx);
        assert_eq!(back.compute_hash().unwrap(), tx.get_hash());
    }

    #[test]
    fn test_input_signature() {
        let (input, _) = signed_input();
        assert!(input.verify_signature());

        let mut forged = input.clone();
        forged.index = 1;
        assert!(!forged.verify_signature());
    }

    #[test]
    fn test_reward_transaction() {
        let tx = Transaction::new_reward("miner", 50).unwrap();
        assert!(tx.is_reward());
        assert!(tx.get_inputs().is_empty());
        assert_eq!(tx.output_sum(), Ok(50));
        assert_eq!(tx.get_id().len(), 64);
    }
}
