//! Test utilities for ledger testing

use crate::core::{Block, Ledger, Transaction, MINING_REWARD};
use crate::error::{BlockchainError, Result};
use crate::storage::{MemoryStore, SledStore};
use crate::wallet::KeyChainWallet;
use tempfile::TempDir;

/// A ledger on a fresh in-memory store, seeded with genesis
pub fn memory_ledger() -> Result<Ledger> {
    Ledger::open(Box::new(MemoryStore::new()))
}

/// A sled store in a temporary directory; keep the directory alive
pub fn temp_sled_store() -> Result<(SledStore, TempDir)> {
    let temp_dir = tempfile::tempdir().map_err(|e| BlockchainError::Io(e.to_string()))?;
    let store = SledStore::open(temp_dir.path().join("ledger"))?;
    Ok((store, temp_dir))
}

/// Mines, without adding, the block after the ledger's tip holding
/// `transactions` plus a reward to `reward_address`
pub fn mine_next_block(
    ledger: &Ledger,
    reward_address: &str,
    mut transactions: Vec<Transaction>,
) -> Result<Block> {
    transactions.push(Transaction::new_reward(reward_address, MINING_REWARD)?);
    let last = ledger.last_block();
    let index = last.get_index() + 1;
    Block::new_block(
        index,
        last.get_hash(),
        transactions,
        ledger.difficulty(Some(index)),
    )
}

/// Grows the ledger by `count` reward-only blocks
pub fn grow_chain(ledger: &mut Ledger, reward_address: &str, count: usize) -> Result<()> {
    for _ in 0..count {
        let block = mine_next_block(ledger, reward_address, vec![])?;
        ledger.add_block(block, false)?;
    }
    Ok(())
}

/// A wallet whose first address holds one mining reward on `ledger`
pub fn funded_wallet(ledger: &mut Ledger, password: &str) -> Result<(KeyChainWallet, String)> {
    let mut wallet = KeyChainWallet::from_password(password)?;
    let address = wallet.generate_address()?;
    grow_chain(ledger, &address, 1)?;
    Ok((wallet, address))
}
