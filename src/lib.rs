//! # Ledger Node
//!
//! A small proof-of-work ledger: a UTXO chain of blocks, a pending pool,
//! deterministic key-chain wallets and a peer protocol that keeps nodes on
//! the longest valid chain.
//!
//! ## How the code is organized
//! - `core/`: blocks, transactions, difficulty, proof-of-work, validation and the ledger
//! - `wallet/`: key-chain wallets and the transaction builder
//! - `network/`: peer transport, the server and chain synchronization
//! - `storage/`: the collection store, pending pool and UTXO resolver
//! - `config/`: node settings
//! - `utils/`: hashing, signatures, key derivation and canonical JSON
//! - `cli/`: command-line arguments
//!
//! ## Where to start reading
//! 1. `core/blockchain.rs` for how blocks and transactions are accepted
//! 2. `core/validation.rs` for the consensus rules
//! 3. `network/sync.rs` for how a node follows its peers

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

pub use cli::{Command, Opt};
pub use config::{Config, GLOBAL_CONFIG};
pub use core::{
    Block, Ledger, LedgerEvent, LedgerInfo, ProofOfWork, SharedLedger, TXInput, TXOutput,
    Transaction, TransactionData, TransactionType,
};
pub use error::{BlockchainError, ErrorKind, Result, ValidationError};
pub use network::{Node, Nodes, PeerSync, Request, Response, Server, SyncOutcome};
pub use storage::{MemoryPool, MemoryStore, SledStore, Store, UnspentOutput};
pub use utils::{current_timestamp, hash, sign, verify};
pub use wallet::{build_transaction, KeyChainWallet, KeyPair, TransferRequest, Wallets};
