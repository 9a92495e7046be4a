use crate::core::{ProofOfWork, Transaction, TransactionData, TransactionType};
use crate::error::Result;
use crate::utils::{current_timestamp, hash, to_canonical_json};
use log::info;
use serde::{Deserialize, Serialize};

const GENESIS_PREVIOUS_HASH: &str = "0";
const GENESIS_TIMESTAMP: i64 = 1465154705;
const GENESIS_TRANSACTION_ID: &str =
    "63ec3ac02f822450039df13ddf7c3c0f19bab4acd4dc928c62fcd78d5ebc6dba";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    index: u64,
    previous_hash: String,
    timestamp: i64,
    nonce: u64,
    transactions: Vec<Transaction>,
    hash: String,
}

impl Block {
    /// Assembles a block at the current time and mines it below `target`
    pub fn new_block(
        index: u64,
        previous_hash: &str,
        transactions: Vec<Transaction>,
        target: u64,
    ) -> Result<Block> {
        // Block timestamps are in seconds, like the genesis constant
        let timestamp = current_timestamp()? / 1000;
        let block = Block::from_parts(index, previous_hash, timestamp, 0, transactions)?;

        info!("Starting proof-of-work for block {index} with target {target:#x}");
        let pow = ProofOfWork::new_proof_of_work(block, target)?;
        let block = pow.run();
        info!("Proof-of-work completed for block {index}: {}", block.get_hash());

        Ok(block)
    }

    /// Builds a block from explicit fields and stamps its hash, no mining
    pub fn from_parts(
        index: u64,
        previous_hash: &str,
        timestamp: i64,
        nonce: u64,
        transactions: Vec<Transaction>,
    ) -> Result<Block> {
        let mut block = Block {
            index,
            previous_hash: previous_hash.to_string(),
            timestamp,
            nonce,
            transactions,
            hash: String::new(),
        };
        block.hash = block.compute_hash()?;
        Ok(block)
    }

    /// The block every chain starts with
    pub fn genesis() -> Result<Block> {
        let transaction = Transaction::new(
            GENESIS_TRANSACTION_ID,
            TransactionType::Regular,
            TransactionData::default(),
        )?;
        Block::from_parts(0, GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP, 0, vec![transaction])
    }

    /// Everything the block hash covers except the nonce
    pub(crate) fn hash_prefix(&self) -> Result<String> {
        let transactions = to_canonical_json(&self.transactions)?;
        Ok(format!(
            "{}{}{}{}",
            self.index, self.previous_hash, self.timestamp, transactions
        ))
    }

    /// SHA-256 of `index ∥ previousHash ∥ timestamp ∥ canonical-JSON(transactions) ∥ nonce`
    pub fn compute_hash(&self) -> Result<String> {
        Ok(hash(&format!("{}{}", self.hash_prefix()?, self.nonce)))
    }

    pub(crate) fn seal(&mut self, nonce: u64, hash: String) {
        self.nonce = nonce;
        self.hash = hash;
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn contains_transaction(&self, id: &str) -> bool {
        self.transactions.iter().any(|tx| tx.get_id() == id)
    }

    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.get_id() == id)
    }
}
