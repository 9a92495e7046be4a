//! Wallet management
//!
//! Deterministic key-chain wallets, the collection a node persists them in,
//! and the builder that turns unspent outputs into a signed transaction.

pub mod builder;
#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

pub use builder::{build_transaction, TransferRequest};
pub use wallet::{KeyChainWallet, KeyPair};
pub use wallets::Wallets;
