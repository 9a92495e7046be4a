//! Error handling for the ledger node
//!
//! Two layers: `ValidationError` carries the reason a consensus rule rejected a
//! block, chain or transaction, and `BlockchainError` wraps it together with
//! the I/O, storage and network failures around it.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Coarse error taxonomy shared by every node on the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Structural,
    HashMismatch,
    Signature,
    Sequence,
    ProofOfWork,
    Balance,
    DoubleSpend,
    Duplicate,
    NotFound,
    ChainLength,
}

/// Why a block, chain or transaction was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    IndexMismatch { expected: u64, actual: u64 },
    ChainBreak { expected: String, actual: String },
    HashMismatch { expected: String, actual: String },
    InsufficientWork { proof: u64, target: u64 },
    BlockBalanceInvalid { inputs: i64, outputs: i64 },
    DoubleSpendWithinBlock { outputs: Vec<String> },
    MultipleRewardTransactions { count: usize },
    GenesisMismatch,
    InvalidSequence,
    TransactionHashMismatch { id: String },
    InvalidInputSignature { transaction: String, index: u32 },
    DuplicateTransaction { id: String },
    RewardWithInputs { id: String },
    InsufficientBalance { inputs: i64, outputs: i64 },
    InsufficientFee { expected: i64, actual: i64 },
    NegativeOutput { count: usize },
    InputAlreadySpent { transaction: String, index: u32 },
    UnknownInput { transaction: String, index: u32 },
    InputMismatch { transaction: String, index: u32 },
    AmountOverflow,
    ChainNotLonger { candidate: usize, local: usize },
    MissingField(&'static str),
    InsufficientFunds { available: i64, required: i64 },
    PoolFull { capacity: usize },
    NothingToMine,
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::IndexMismatch { .. }
            | ValidationError::ChainBreak { .. }
            | ValidationError::GenesisMismatch
            | ValidationError::InvalidSequence => ErrorKind::Sequence,
            ValidationError::HashMismatch { .. }
            | ValidationError::TransactionHashMismatch { .. } => ErrorKind::HashMismatch,
            ValidationError::InsufficientWork { .. } => ErrorKind::ProofOfWork,
            ValidationError::BlockBalanceInvalid { .. }
            | ValidationError::InsufficientBalance { .. }
            | ValidationError::InsufficientFee { .. }
            | ValidationError::NegativeOutput { .. }
            | ValidationError::AmountOverflow
            | ValidationError::InsufficientFunds { .. } => ErrorKind::Balance,
            ValidationError::DoubleSpendWithinBlock { .. }
            | ValidationError::InputAlreadySpent { .. } => ErrorKind::DoubleSpend,
            ValidationError::MultipleRewardTransactions { .. }
            | ValidationError::RewardWithInputs { .. }
            | ValidationError::MissingField(_)
            | ValidationError::PoolFull { .. }
            | ValidationError::NothingToMine => ErrorKind::Structural,
            ValidationError::InvalidInputSignature { .. }
            | ValidationError::InputMismatch { .. } => ErrorKind::Signature,
            ValidationError::UnknownInput { .. } => ErrorKind::NotFound,
            ValidationError::DuplicateTransaction { .. } => ErrorKind::Duplicate,
            ValidationError::ChainNotLonger { .. } => ErrorKind::ChainLength,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::IndexMismatch { expected, actual } => {
                write!(f, "Invalid index: expected '{expected}' got '{actual}'")
            }
            ValidationError::ChainBreak { expected, actual } => {
                write!(f, "Invalid previous hash: expected '{expected}' got '{actual}'")
            }
            ValidationError::HashMismatch { expected, actual } => {
                write!(f, "Invalid hash: expected '{expected}' got '{actual}'")
            }
            ValidationError::InsufficientWork { proof, target } => write!(
                f,
                "Invalid proof-of-work: expected '{proof}' to be smaller than '{target}'"
            ),
            ValidationError::BlockBalanceInvalid { inputs, outputs } => write!(
                f,
                "Invalid block balance: inputs sum '{inputs}', outputs sum '{outputs}'"
            ),
            ValidationError::DoubleSpendWithinBlock { outputs } => write!(
                f,
                "Outputs spent more than once in the same block: '{}'",
                outputs.join(", ")
            ),
            ValidationError::MultipleRewardTransactions { count } => {
                write!(f, "Invalid reward transaction count: expected '1' got '{count}'")
            }
            ValidationError::GenesisMismatch => write!(f, "Genesis blocks aren't the same"),
            ValidationError::InvalidSequence => write!(f, "Invalid block sequence"),
            ValidationError::TransactionHashMismatch { id } => {
                write!(f, "Invalid hash for transaction '{id}'")
            }
            ValidationError::InvalidInputSignature { transaction, index } => {
                write!(f, "Invalid input signature for output {transaction}:{index}")
            }
            ValidationError::DuplicateTransaction { id } => {
                write!(f, "Transaction '{id}' is already known")
            }
            ValidationError::RewardWithInputs { id } => {
                write!(f, "Reward transaction '{id}' must not have inputs")
            }
            ValidationError::InsufficientBalance { inputs, outputs } => write!(
                f,
                "Invalid transaction balance: inputs sum '{inputs}', outputs sum '{outputs}'"
            ),
            ValidationError::InsufficientFee { expected, actual } => {
                write!(f, "Not enough fee: expected '{expected}' got '{actual}'")
            }
            ValidationError::NegativeOutput { count } => {
                write!(f, "Transaction has '{count}' negative output(s)")
            }
            ValidationError::InputAlreadySpent { transaction, index } => {
                write!(f, "Output {transaction}:{index} is already spent")
            }
            ValidationError::UnknownInput { transaction, index } => {
                write!(f, "Output {transaction}:{index} does not exist")
            }
            ValidationError::InputMismatch { transaction, index } => write!(
                f,
                "Input does not match the address or amount of output {transaction}:{index}"
            ),
            ValidationError::AmountOverflow => write!(f, "Amount sum overflow"),
            ValidationError::ChainNotLonger { candidate, local } => write!(
                f,
                "Received chain of length {candidate} is not longer than the local chain of length {local}"
            ),
            ValidationError::MissingField(field) => write!(f, "Missing field: {field}"),
            ValidationError::InsufficientFunds {
                available,
                required,
            } => write!(
                f,
                "Insufficient funds: required more than {required}, available {available}"
            ),
            ValidationError::PoolFull { capacity } => {
                write!(f, "Pending pool is full ({capacity} transactions)")
            }
            ValidationError::NothingToMine => {
                write!(f, "Not enough transactions to populate the block")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Error types for every ledger node operation
#[derive(Debug, Clone)]
pub enum BlockchainError {
    /// Consensus rule violations
    Validation(ValidationError),
    /// Lookup misses (block, transaction, wallet, key)
    NotFound(String),
    /// Database-related errors
    Database(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Peer communication errors
    Network(String),
    /// Wallet operation errors
    Wallet(String),
    /// Configuration errors
    Config(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
}

impl BlockchainError {
    /// Taxonomy of the error, when it comes from a consensus check or a lookup
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            BlockchainError::Validation(e) => Some(e.kind()),
            BlockchainError::NotFound(_) => Some(ErrorKind::NotFound),
            _ => None,
        }
    }

    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            BlockchainError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Validation(e) => write!(f, "Validation error: {e}"),
            BlockchainError::NotFound(msg) => write!(f, "Not found: {msg}"),
            BlockchainError::Database(msg) => write!(f, "Database error: {msg}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Network(msg) => write!(f, "Network error: {msg}"),
            BlockchainError::Wallet(msg) => write!(f, "Wallet error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<ValidationError> for BlockchainError {
    fn from(err: ValidationError) -> Self {
        BlockchainError::Validation(err)
    }
}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_kinds() {
        assert_eq!(
            ValidationError::IndexMismatch {
                expected: 2,
                actual: 1
            }
            .kind(),
            ErrorKind::Sequence
        );
        assert_eq!(
            ValidationError::DoubleSpendWithinBlock { outputs: vec![] }.kind(),
            ErrorKind::DoubleSpend
        );
        assert_eq!(
            ValidationError::ChainNotLonger {
                candidate: 2,
                local: 3
            }
            .kind(),
            ErrorKind::ChainLength
        );
    }

    #[test]
    fn test_blockchain_error_kind_passthrough() {
        let err: BlockchainError = ValidationError::InvalidSequence.into();
        assert_eq!(err.kind(), Some(ErrorKind::Sequence));
        assert_eq!(
            BlockchainError::NotFound("block".into()).kind(),
            Some(ErrorKind::NotFound)
        );
        assert_eq!(BlockchainError::Network("down".into()).kind(), None);
    }
}
