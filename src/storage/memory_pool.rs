use crate::core::{Block, Transaction};
use crate::error::ValidationError;

/// Pending transactions in arrival order, capped at `capacity`
#[derive(Debug, Clone)]
pub struct MemoryPool {
    transactions: Vec<Transaction>,
    capacity: usize,
}

impl MemoryPool {
    pub fn new(capacity: usize) -> MemoryPool {
        MemoryPool {
            transactions: Vec::new(),
            capacity,
        }
    }

    /// Restores a persisted pool; anything beyond the cap is dropped from the tail
    pub fn from_transactions(mut transactions: Vec<Transaction>, capacity: usize) -> MemoryPool {
        if transactions.len() > capacity {
            log::warn!(
                "Dropping {} pending transactions over the pool capacity",
                transactions.len() - capacity
            );
            transactions.truncate(capacity);
        }
        MemoryPool {
            transactions,
            capacity,
        }
    }

    pub fn add(&mut self, tx: Transaction) -> Result<(), ValidationError> {
        if self.contains(tx.get_id()) {
            return Err(ValidationError::DuplicateTransaction {
                id: tx.get_id().to_string(),
            });
        }
        if self.transactions.len() >= self.capacity {
            return Err(ValidationError::PoolFull {
                capacity: self.capacity,
            });
        }
        self.transactions.push(tx);
        Ok(())
    }

    pub fn get(&self, txid: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.get_id() == txid)
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.get(txid).is_some()
    }

    pub fn remove(&mut self, txid: &str) -> Option<Transaction> {
        let position = self.transactions.iter().position(|tx| tx.get_id() == txid)?;
        Some(self.transactions.remove(position))
    }

    /// Drops every pending transaction `block` commits, returns how many went
    pub fn remove_committed(&mut self, block: &Block) -> usize {
        let before = self.transactions.len();
        self.transactions
            .retain(|tx| !block.contains_transaction(tx.get_id()));
        before - self.transactions.len()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn get_all(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_and_duplicates() {
        let mut pool = MemoryPool::new(10);
        let first = Transaction::new_reward("a", 1).unwrap();
        let second = Transaction::new_reward("b", 1).unwrap();
        pool.add(first.clone()).unwrap();
        pool.add(second.clone()).unwrap();

        assert_eq!(pool.get_all()[0], first);
        assert_eq!(pool.get_all()[1], second);
        assert!(matches!(
            pool.add(first.clone()),
            Err(ValidationError::DuplicateTransaction { .. })
        ));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_capacity() {
        let mut pool = MemoryPool::new(1);
        pool.add(Transaction::new_reward("a", 1).unwrap()).unwrap();
        assert_eq!(
            pool.add(Transaction::new_reward("b", 1).unwrap()),
            Err(ValidationError::PoolFull { capacity: 1 })
        );

        let restored = MemoryPool::from_transactions(
            vec![
                Transaction::new_reward("a", 1).unwrap(),
                Transaction::new_reward("b", 1).unwrap(),
            ],
            1,
        );
        assert_eq!(restored.len(), 1);
    }

    #[test]
    fn test_remove_committed() {
        let mut pool = MemoryPool::new(10);
        let kept = Transaction::new_reward("a", 1).unwrap();
        let committed = Transaction::new_reward("b", 1).unwrap();
        pool.add(kept.clone()).unwrap();
        pool.add(committed.clone()).unwrap();

        let block = Block::from_parts(1, "prev", 0, 0, vec![committed]).unwrap();
        assert_eq!(pool.remove_committed(&block), 1);
        assert_eq!(pool.get_all(), &[kept]);
        assert!(pool.remove("missing").is_none());
    }
}
