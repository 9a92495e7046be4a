//! Core ledger functionality
//!
//! Blocks, transactions, the difficulty curve, proof-of-work, the consensus
//! validator and the ledger that ties them together.

pub mod block;
pub mod blockchain;
pub mod difficulty;
pub mod monetary;
pub mod proof_of_work;
pub mod transaction;
pub mod validation;

pub use block::Block;
pub use blockchain::{CandidateTemplate, Ledger, LedgerEvent, LedgerInfo, SharedLedger};
pub use difficulty::{difficulty, proof_value, BASE_DIFFICULTY, EVERY_X_BLOCKS, POW_CURVE};
pub use monetary::{
    FEE_PER_TRANSACTION, MAX_PENDING_TRANSACTIONS, MINING_REWARD, TRANSACTIONS_PER_BLOCK,
};
pub use proof_of_work::ProofOfWork;
pub use transaction::{TXInput, TXOutput, Transaction, TransactionData, TransactionType};
pub use validation::{validate_block, validate_chain, validate_transaction};
