//! Data storage and persistence
//!
//! The pending pool, the chain-scanning UTXO resolver, and the
//! load-all/write-all collection store behind the ledger and wallets.

pub mod memory_pool;
pub mod store;
pub mod utxo_set;

pub use memory_pool::MemoryPool;
pub use store::{
    load_all, write_all, MemoryStore, SledStore, Store, BLOCKS_COLLECTION,
    TRANSACTIONS_COLLECTION, WALLETS_COLLECTION,
};
pub use utxo_set::{balance, unspent_outputs, UnspentOutput};
