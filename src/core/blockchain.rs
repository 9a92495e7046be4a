// This is the ledger: the committed chain plus the pool of pending transactions
// Every mutation goes through validation first and is persisted before it is announced
// Callers share it as Arc<RwLock<Ledger>>, so one writer at a time appends or replaces

use crate::core::difficulty::difficulty;
use crate::core::monetary::{MAX_PENDING_TRANSACTIONS, MINING_REWARD, TRANSACTIONS_PER_BLOCK};
use crate::core::validation::{validate_block, validate_chain, validate_transaction};
use crate::core::{Block, Transaction};
use crate::error::{BlockchainError, Result, ValidationError};
use crate::storage::{
    load_all, unspent_outputs, write_all, MemoryPool, Store, UnspentOutput, BLOCKS_COLLECTION,
    TRANSACTIONS_COLLECTION,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::mpsc::Sender;
use std::sync::{Arc, RwLock};

pub type SharedLedger = Arc<RwLock<Ledger>>;

/// What the ledger announces after a committed mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    BlockAdded(Block),
    ChainExtended(Vec<Block>),
    TransactionAdded(Transaction),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerInfo {
    pub height: u64,
    pub blocks: usize,
    pub last_hash: String,
    pub pending: usize,
    pub next_difficulty: u64,
}

/// The next block minus its proof of work.
///
/// Built under the ledger lock and mined without it; the mined block still
/// goes through `add_block`, which refuses it if the tip moved meanwhile.
#[derive(Debug, Clone)]
pub struct CandidateTemplate {
    index: u64,
    previous_hash: String,
    transactions: Vec<Transaction>,
    target: u64,
}

impl CandidateTemplate {
    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn mine(self) -> Result<Block> {
        Block::new_block(self.index, &self.previous_hash, self.transactions, self.target)
    }
}

pub struct Ledger {
    blocks: Vec<Block>,
    pool: MemoryPool,
    store: Box<dyn Store>,
    events: Option<Sender<LedgerEvent>>,
}

impl Ledger {
    // I load both collections, seed the genesis block on a fresh store and
    // drop pending transactions that were committed before the last shutdown
    pub fn open(store: Box<dyn Store>) -> Result<Ledger> {
        let genesis = Block::genesis()?;
        let mut blocks: Vec<Block> = load_all(store.as_ref(), BLOCKS_COLLECTION)?;
        if blocks.is_empty() {
            info!("Ledger is empty, adding the genesis block");
            blocks.push(genesis);
            write_all(store.as_ref(), BLOCKS_COLLECTION, &blocks)?;
        } else if blocks[0] != genesis {
            return Err(ValidationError::GenesisMismatch.into());
        }

        let pending: Vec<Transaction> = load_all(store.as_ref(), TRANSACTIONS_COLLECTION)?;
        let mut pool = MemoryPool::from_transactions(pending, MAX_PENDING_TRANSACTIONS);
        let culled: usize = blocks
            .iter()
            .map(|block| pool.remove_committed(block))
            .sum();

        let ledger = Ledger {
            blocks,
            pool,
            store,
            events: None,
        };
        if culled > 0 {
            info!("Culled {culled} already committed pending transactions");
            ledger.persist_pool()?;
        }
        info!(
            "Ledger opened with {} blocks and {} pending transactions",
            ledger.blocks.len(),
            ledger.pool.len()
        );
        Ok(ledger)
    }

    pub fn into_shared(self) -> SharedLedger {
        Arc::new(RwLock::new(self))
    }

    /// Committed mutations are sent here; a dropped receiver is only logged
    pub fn set_event_sender(&mut self, sender: Sender<LedgerEvent>) {
        self.events = Some(sender);
    }

    fn emit(&self, event: LedgerEvent) {
        if let Some(sender) = &self.events {
            if sender.send(event).is_err() {
                warn!("Ledger event receiver is gone, dropping event");
            }
        }
    }

    fn persist_blocks(&self) -> Result<()> {
        write_all(self.store.as_ref(), BLOCKS_COLLECTION, &self.blocks)
    }

    fn persist_pool(&self) -> Result<()> {
        write_all(self.store.as_ref(), TRANSACTIONS_COLLECTION, self.pool.get_all())
    }

    /// Validates `block` against the tip, appends it and culls the pool.
    pub fn add_block(&mut self, block: Block, broadcast: bool) -> Result<Block> {
        if let Err(reason) = validate_block(&block, self.last_block(), &self.blocks) {
            warn!("Rejected block {}: {reason}", block.get_index());
            return Err(reason.into());
        }

        self.blocks.push(block.clone());
        if let Err(e) = self.persist_blocks() {
            self.blocks.pop();
            return Err(e);
        }

        // The block is committed at this point; a stale pool on disk is culled on the next open
        if self.pool.remove_committed(&block) > 0 {
            if let Err(e) = self.persist_pool() {
                warn!("Failed to persist the pending pool after block {}: {e}", block.get_index());
            }
        }

        info!("Block added: {} (index {})", block.get_hash(), block.get_index());
        if broadcast {
            self.emit(LedgerEvent::BlockAdded(block.clone()));
        }
        Ok(block)
    }

    /// Admits `tx` to the pending pool.
    ///
    /// Only the committed chain is consulted; two pending transactions may
    /// still spend the same output until one of them is mined.
    pub fn add_transaction(&mut self, tx: Transaction, broadcast: bool) -> Result<Transaction> {
        let admitted = if self.pool.contains(tx.get_id()) {
            Err(ValidationError::DuplicateTransaction {
                id: tx.get_id().to_string(),
            })
        } else {
            validate_transaction(&tx, &self.blocks).and_then(|_| self.pool.add(tx.clone()))
        };
        if let Err(reason) = admitted {
            warn!("Rejected transaction {}: {reason}", tx.get_id());
            return Err(reason.into());
        }

        if let Err(e) = self.persist_pool() {
            self.pool.remove(tx.get_id());
            return Err(e);
        }

        info!("Transaction added: {}", tx.get_id());
        if broadcast {
            self.emit(LedgerEvent::TransactionAdded(tx.clone()));
        }
        Ok(tx)
    }

    /// Adopts a longer valid chain and returns the blocks that were appended.
    ///
    /// Blocks shared with the local chain are kept; a diverging local suffix
    /// is dropped before the foreign blocks are appended one by one.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<Vec<Block>> {
        if candidate.len() <= self.blocks.len() {
            warn!(
                "Received chain of {} blocks is not longer than ours ({})",
                candidate.len(),
                self.blocks.len()
            );
            return Err(ValidationError::ChainNotLonger {
                candidate: candidate.len(),
                local: self.blocks.len(),
            }
            .into());
        }

        validate_chain(&candidate)?;
        info!("Received chain is valid, replacing the local chain");

        let common = self
            .blocks
            .iter()
            .zip(candidate.iter())
            .take_while(|(ours, theirs)| ours == theirs)
            .count();
        let previous = self.blocks.clone();
        if common < self.blocks.len() {
            warn!(
                "Dropping {} local blocks that diverge from the received chain",
                self.blocks.len() - common
            );
            self.blocks.truncate(common);
        }

        let mut appended = Vec::with_capacity(candidate.len() - common);
        for block in candidate.into_iter().skip(common) {
            match self.add_block(block, false) {
                Ok(block) => appended.push(block),
                Err(e) => {
                    self.blocks = previous;
                    self.persist_blocks()?;
                    return Err(e);
                }
            }
        }

        self.emit(LedgerEvent::ChainExtended(appended.clone()));
        Ok(appended)
    }

    /// Builds and mines the next block from the pending pool.
    /// The block is returned, not added.
    pub fn assemble_candidate(&mut self, reward_address: &str) -> Result<Block> {
        self.candidate_template(reward_address)?.mine()
    }

    /// Picks the transactions of the next block.
    ///
    /// Pending transactions are taken first come first served; ones that no
    /// longer validate or that spend an output another picked transaction
    /// already spends are dropped from the pool. A reward paying
    /// `reward_address` is appended.
    pub fn candidate_template(&mut self, reward_address: &str) -> Result<CandidateTemplate> {
        let mut picked: Vec<Transaction> = Vec::new();
        let mut picked_inputs: HashSet<(String, u32)> = HashSet::new();
        let mut discarded: Vec<String> = Vec::new();

        for tx in self.pool.get_all() {
            if picked.len() == TRANSACTIONS_PER_BLOCK {
                break;
            }
            if let Err(reason) = validate_transaction(tx, &self.blocks) {
                warn!("Discarding pending transaction {}: {reason}", tx.get_id());
                discarded.push(tx.get_id().to_string());
                continue;
            }
            if tx
                .get_inputs()
                .iter()
                .any(|input| picked_inputs.contains(&input.outpoint()))
            {
                warn!("Discarding pending transaction {}: double spending", tx.get_id());
                discarded.push(tx.get_id().to_string());
                continue;
            }
            picked_inputs.extend(tx.get_inputs().iter().map(|input| input.outpoint()));
            picked.push(tx.clone());
        }

        if !discarded.is_empty() {
            for id in &discarded {
                self.pool.remove(id);
            }
            self.persist_pool()?;
        }

        if picked.is_empty() {
            warn!("Not enough transactions to populate the block");
            return Err(ValidationError::NothingToMine.into());
        }

        picked.push(Transaction::new_reward(reward_address, MINING_REWARD)?);
        let last = self.last_block();
        let index = last.get_index() + 1;
        Ok(CandidateTemplate {
            index,
            previous_hash: last.get_hash().to_string(),
            transactions: picked,
            target: difficulty(self.blocks.len(), Some(index)),
        })
    }

    pub fn blocks(&self) -> &[Block] {
        self.blocks.as_slice()
    }

    pub fn last_block(&self) -> &Block {
        // Never empty: open() seeds the genesis block
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn block_by_index(&self, index: u64) -> Result<&Block> {
        self.blocks
            .iter()
            .find(|block| block.get_index() == index)
            .ok_or_else(|| BlockchainError::NotFound(format!("Block with index {index}")))
    }

    pub fn block_by_hash(&self, hash: &str) -> Result<&Block> {
        self.blocks
            .iter()
            .find(|block| block.get_hash() == hash)
            .ok_or_else(|| BlockchainError::NotFound(format!("Block with hash {hash}")))
    }

    /// `start..end` for a non-negative start, otherwise the last `end` blocks
    pub fn blocks_in_range(&self, start: i64, end: usize) -> Vec<Block> {
        range_of(&self.blocks, start, end)
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        self.pool.get_all()
    }

    pub fn pending_transaction(&self, id: &str) -> Result<&Transaction> {
        self.pool
            .get(id)
            .ok_or_else(|| BlockchainError::NotFound(format!("Pending transaction {id}")))
    }

    pub fn block_containing(&self, transaction_id: &str) -> Result<&Block> {
        self.blocks
            .iter()
            .find(|block| block.contains_transaction(transaction_id))
            .ok_or_else(|| {
                BlockchainError::NotFound(format!("Block containing transaction {transaction_id}"))
            })
    }

    pub fn committed_transactions(&self) -> Vec<Transaction> {
        self.blocks
            .iter()
            .flat_map(|block| block.get_transactions().iter().cloned())
            .collect()
    }

    pub fn transactions_in_range(&self, start: i64, end: usize) -> Vec<Transaction> {
        range_of(&self.committed_transactions(), start, end)
    }

    pub fn unspent_for(&self, address: Option<&str>) -> Vec<UnspentOutput> {
        unspent_outputs(&self.blocks, address)
    }

    /// Blocks on top of and including the one holding `transaction_id`; 0 while pending
    pub fn confirmations(&self, transaction_id: &str) -> Result<u64> {
        if let Ok(block) = self.block_containing(transaction_id) {
            return Ok(self.last_block().get_index() - block.get_index() + 1);
        }
        if self.pool.contains(transaction_id) {
            return Ok(0);
        }
        Err(BlockchainError::NotFound(format!(
            "Transaction {transaction_id}"
        )))
    }

    pub fn difficulty(&self, index: Option<u64>) -> u64 {
        difficulty(self.blocks.len(), index)
    }

    pub fn info(&self) -> LedgerInfo {
        let last = self.last_block();
        LedgerInfo {
            height: last.get_index(),
            blocks: self.blocks.len(),
            last_hash: last.get_hash().to_string(),
            pending: self.pool.len(),
            next_difficulty: self.difficulty(None),
        }
    }
}

fn range_of<T: Clone>(items: &[T], start: i64, end: usize) -> Vec<T> {
    let (from, to) = if start >= 0 {
        (start as usize, end.min(items.len()))
    } else {
        (items.len().saturating_sub(end), items.len())
    };
    if from >= to {
        return Vec::new();
    }
    items[from..to].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FEE_PER_TRANSACTION;
    use crate::error::ErrorKind;
    use crate::storage::MemoryStore;
    use crate::testnet::{funded_wallet, mine_next_block};
    use crate::wallet::{build_transaction, KeyChainWallet, TransferRequest};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::channel;

    fn ledger() -> Ledger {
        Ledger::open(Box::new(MemoryStore::new())).unwrap()
    }

    fn transfer(wallet: &KeyChainWallet, from: &str, utxo: &UnspentOutput, to: &str) -> Transaction {
        build_transaction(TransferRequest {
            utxos: vec![utxo.clone()],
            destination: to.to_string(),
            amount: 10,
            change_address: from.to_string(),
            fee: FEE_PER_TRANSACTION,
            secret: wallet.secret_key_for(from).unwrap().to_string(),
        })
        .unwrap()
    }

    /// Memory store whose pool writes can be made to fail
    #[derive(Clone, Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_pool: Arc<AtomicBool>,
    }

    impl Store for FlakyStore {
        fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
            self.inner.load(name)
        }

        fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
            if name == TRANSACTIONS_COLLECTION && self.fail_pool.load(Ordering::SeqCst) {
                return Err(BlockchainError::Database("disk full".to_string()));
            }
            self.inner.save(name, bytes)
        }
    }

    fn mine_reward_block(ledger: &Ledger, to: &str) -> Block {
        let last = ledger.last_block();
        let index = last.get_index() + 1;
        let reward = Transaction::new_reward(to, MINING_REWARD).unwrap();
        Block::new_block(index, last.get_hash(), vec![reward], ledger.difficulty(Some(index)))
            .unwrap()
    }

    #[test]
    fn test_open_seeds_genesis() {
        let ledger = ledger();
        assert_eq!(ledger.blocks().len(), 1);
        assert_eq!(ledger.last_block(), &Block::genesis().unwrap());
        assert!(ledger.pending_transactions().is_empty());
    }

    #[test]
    fn test_add_block_twice_is_a_sequence_error() {
        let mut ledger = ledger();
        let block = mine_reward_block(&ledger, "miner");
        ledger.add_block(block.clone(), false).unwrap();

        let err = ledger.add_block(block, false).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Sequence));
        assert_eq!(ledger.blocks().len(), 2);
    }

    #[test]
    fn test_events_follow_broadcast_flag() {
        let (sender, receiver) = channel();
        let mut ledger = ledger();
        ledger.set_event_sender(sender);

        let quiet = mine_reward_block(&ledger, "miner");
        ledger.add_block(quiet, false).unwrap();
        assert!(receiver.try_recv().is_err());

        let loud = mine_reward_block(&ledger, "miner");
        ledger.add_block(loud.clone(), true).unwrap();
        assert_eq!(receiver.try_recv().unwrap(), LedgerEvent::BlockAdded(loud));
    }

    #[test]
    fn test_reads() {
        let mut ledger = ledger();
        let first = ledger.add_block(mine_reward_block(&ledger, "a"), false).unwrap();
        let second = ledger.add_block(mine_reward_block(&ledger, "b"), false).unwrap();

        assert_eq!(ledger.block_by_index(1).unwrap(), &first);
        assert_eq!(ledger.block_by_hash(second.get_hash()).unwrap(), &second);
        assert!(matches!(ledger.block_by_index(9), Err(BlockchainError::NotFound(_))));
        assert_eq!(ledger.blocks_in_range(1, 10), vec![first.clone(), second.clone()]);
        assert_eq!(ledger.blocks_in_range(-1, 1), vec![second.clone()]);
        assert!(ledger.blocks_in_range(2, 1).is_empty());

        let reward_id = second.get_transactions()[0].get_id();
        assert_eq!(ledger.block_containing(reward_id).unwrap(), &second);
        assert_eq!(ledger.confirmations(reward_id).unwrap(), 1);
        assert_eq!(
            ledger.confirmations(first.get_transactions()[0].get_id()).unwrap(),
            2
        );
        assert!(ledger.confirmations("unknown").is_err());

        assert_eq!(ledger.committed_transactions().len(), 3);
        assert_eq!(ledger.transactions_in_range(-2, 2).len(), 2);
        assert_eq!(ledger.unspent_for(Some("b"))[0].amount, MINING_REWARD);

        let info = ledger.info();
        assert_eq!(info.height, 2);
        assert_eq!(info.blocks, 3);
        assert_eq!(info.last_hash, second.get_hash());
    }

    #[test]
    fn test_replace_chain_rejects_shorter() {
        let mut ledger = ledger();
        ledger.add_block(mine_reward_block(&ledger, "a"), false).unwrap();
        let before = ledger.blocks().to_vec();

        let err = ledger
            .replace_chain(vec![Block::genesis().unwrap()])
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::ChainLength));
        assert_eq!(ledger.blocks(), before.as_slice());
    }

    #[test]
    fn test_replace_chain_with_fork() {
        let mut ours = ledger();
        let mut theirs = ledger();
        ours.add_block(mine_reward_block(&ours, "ours"), false).unwrap();
        for _ in 0..3 {
            let block = mine_reward_block(&theirs, "theirs");
            theirs.add_block(block, false).unwrap();
        }

        let (sender, receiver) = channel();
        ours.set_event_sender(sender);
        let appended = ours.replace_chain(theirs.blocks().to_vec()).unwrap();

        assert_eq!(appended.len(), 3);
        assert_eq!(ours.blocks(), theirs.blocks());
        assert_eq!(
            receiver.try_recv().unwrap(),
            LedgerEvent::ChainExtended(appended)
        );
        assert!(ours.unspent_for(Some("ours")).is_empty());
    }

    #[test]
    fn test_assemble_candidate_needs_transactions() {
        let mut ledger = ledger();
        let err = ledger.assemble_candidate("miner").unwrap_err();
        assert_eq!(
            err.as_validation(),
            Some(&ValidationError::NothingToMine)
        );
    }

    #[test]
    fn test_candidate_keeps_first_of_conflicting_spends() {
        let store = MemoryStore::new();
        let mut ledger = Ledger::open(Box::new(store.clone())).unwrap();
        let (wallet, from) = funded_wallet(&mut ledger, "conflicts").unwrap();
        let utxo = ledger.unspent_for(Some(&from))[0].clone();

        let first = transfer(&wallet, &from, &utxo, "alice");
        let second = transfer(&wallet, &from, &utxo, "bob");
        ledger.add_transaction(first.clone(), false).unwrap();
        ledger.add_transaction(second.clone(), false).unwrap();

        let candidate = ledger.assemble_candidate("miner").unwrap();
        assert_eq!(candidate.get_transactions().len(), 2);
        assert_eq!(candidate.get_transactions()[0], first);
        assert_eq!(ledger.pending_transactions(), &[first.clone()]);
        assert!(ledger.pending_transaction(second.get_id()).is_err());

        // The discard was written through
        let reloaded = Ledger::open(Box::new(store)).unwrap();
        assert_eq!(reloaded.pending_transactions(), &[first]);
    }

    #[test]
    fn test_candidate_drops_transactions_spent_by_a_committed_block() {
        let store = MemoryStore::new();
        let mut ledger = Ledger::open(Box::new(store.clone())).unwrap();
        let (wallet, from) = funded_wallet(&mut ledger, "outpaced").unwrap();
        let utxo = ledger.unspent_for(Some(&from))[0].clone();

        let mined = transfer(&wallet, &from, &utxo, "alice");
        let stale = transfer(&wallet, &from, &utxo, "bob");
        ledger.add_transaction(mined.clone(), false).unwrap();
        ledger.add_transaction(stale.clone(), false).unwrap();

        let block = mine_next_block(&ledger, "miner", vec![mined]).unwrap();
        ledger.add_block(block, false).unwrap();
        assert_eq!(ledger.pending_transactions(), &[stale]);

        let err = ledger.assemble_candidate("miner").unwrap_err();
        assert_eq!(err.as_validation(), Some(&ValidationError::NothingToMine));
        assert!(ledger.pending_transactions().is_empty());
        let reloaded = Ledger::open(Box::new(store)).unwrap();
        assert!(reloaded.pending_transactions().is_empty());
    }

    #[test]
    fn test_stale_template_is_refused() {
        let mut ledger = ledger();
        let (wallet, from) = funded_wallet(&mut ledger, "stale").unwrap();
        let utxo = ledger.unspent_for(Some(&from))[0].clone();
        ledger
            .add_transaction(transfer(&wallet, &from, &utxo, "alice"), false)
            .unwrap();

        let template = ledger.candidate_template("miner").unwrap();
        assert_eq!(template.get_index(), 2);
        assert_eq!(template.get_transactions().len(), 2);

        // Someone else extends the tip while the template is being mined
        let competing = mine_reward_block(&ledger, "rival");
        ledger.add_block(competing.clone(), false).unwrap();

        let err = ledger.add_block(template.mine().unwrap(), false).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Sequence));
        assert_eq!(ledger.last_block(), &competing);
    }

    #[test]
    fn test_pool_write_failure_keeps_committed_block() {
        let store = FlakyStore::default();
        let mut ledger = Ledger::open(Box::new(store.clone())).unwrap();
        let (wallet, from) = funded_wallet(&mut ledger, "flaky").unwrap();
        let utxo = ledger.unspent_for(Some(&from))[0].clone();
        let tx = transfer(&wallet, &from, &utxo, "alice");
        ledger.add_transaction(tx.clone(), false).unwrap();

        store.fail_pool.store(true, Ordering::SeqCst);
        let block = mine_next_block(&ledger, "miner", vec![tx.clone()]).unwrap();
        let added = ledger.add_block(block.clone(), false).unwrap();
        assert_eq!(added, block);
        assert_eq!(ledger.last_block(), &block);
        assert!(ledger.pending_transactions().is_empty());

        // The stale pool on disk still holds the transaction until the next open
        store.fail_pool.store(false, Ordering::SeqCst);
        let reloaded = Ledger::open(Box::new(store)).unwrap();
        assert_eq!(reloaded.blocks(), ledger.blocks());
        assert!(reloaded.pending_transactions().is_empty());
        assert_eq!(reloaded.confirmations(tx.get_id()).unwrap(), 1);
    }

    #[test]
    fn test_range_of() {
        let items = vec![1, 2, 3, 4];
        assert_eq!(range_of(&items, 0, 2), vec![1, 2]);
        assert_eq!(range_of(&items, 1, 100), vec![2, 3, 4]);
        assert_eq!(range_of(&items, -2, 2), vec![3, 4]);
        assert_eq!(range_of(&items, -1, 10), vec![1, 2, 3, 4]);
        assert!(range_of(&items, 5, 6).is_empty());
    }
}
