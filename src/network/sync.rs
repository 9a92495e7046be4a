// Reconciles our chain with blocks announced by a peer.
// The caller holds the ledger write lock for the duration of one call.

use crate::core::{Block, Ledger};
use crate::error::{Result, ValidationError};
use log::info;
use serde::{Deserialize, Serialize};

/// What happened to the foreign blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// Our chain grew
    Extended,
    /// A lone block that does not attach to our tip; fetch the full chain
    RequestFullChain,
    /// We are not behind; nothing changed
    Ahead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    SingleBlockReceived,
    AwaitingFullChain,
    Synced,
}

#[derive(Debug, Default)]
pub struct PeerSync {
    state: SyncState,
}

impl PeerSync {
    pub fn new() -> PeerSync {
        PeerSync::default()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Applies foreign blocks to `ledger`; any error resets the state to `Idle`
    pub fn on_foreign_blocks(&mut self, ledger: &mut Ledger, blocks: Vec<Block>) -> Result<SyncOutcome> {
        match self.apply(ledger, blocks) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.state = SyncState::Idle;
                Err(e)
            }
        }
    }

    fn apply(&mut self, ledger: &mut Ledger, mut blocks: Vec<Block>) -> Result<SyncOutcome> {
        blocks.sort_by_key(Block::get_index);
        let Some(apex_foreign) = blocks.last().cloned() else {
            return Err(ValidationError::MissingField("blocks").into());
        };
        if blocks.len() == 1 {
            self.state = SyncState::SingleBlockReceived;
        }

        let apex_here = ledger.last_block();
        if apex_foreign.get_index() <= apex_here.get_index() {
            info!(
                "Received block {} is not ahead of ours ({}), nothing to do",
                apex_foreign.get_index(),
                apex_here.get_index()
            );
            self.state = SyncState::Synced;
            return Ok(SyncOutcome::Ahead);
        }

        if apex_here.get_hash() == apex_foreign.get_previous_hash() {
            info!("Received block {} extends our tip", apex_foreign.get_index());
            ledger.add_block(apex_foreign, true)?;
            self.state = SyncState::Synced;
            return Ok(SyncOutcome::Extended);
        }

        if blocks.len() == 1 {
            info!(
                "Received block {} is ahead by more than one block, requesting the full chain",
                apex_foreign.get_index()
            );
            self.state = SyncState::AwaitingFullChain;
            return Ok(SyncOutcome::RequestFullChain);
        }

        ledger.replace_chain(blocks)?;
        self.state = SyncState::Synced;
        Ok(SyncOutcome::Extended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Transaction, MINING_REWARD};
    use crate::error::ErrorKind;
    use crate::storage::MemoryStore;

    fn ledger() -> Ledger {
        Ledger::open(Box::new(MemoryStore::new())).unwrap()
    }

    fn grow(ledger: &mut Ledger, count: usize) {
        for _ in 0..count {
            let last = ledger.last_block().clone();
            let index = last.get_index() + 1;
            let reward = Transaction::new_reward("miner", MINING_REWARD).unwrap();
            let block =
                Block::new_block(index, last.get_hash(), vec![reward], ledger.difficulty(Some(index)))
                    .unwrap();
            ledger.add_block(block, false).unwrap();
        }
    }

    #[test]
    fn test_next_block_extends() {
        let mut ours = ledger();
        let mut theirs = ledger();
        grow(&mut theirs, 1);

        let mut sync = PeerSync::new();
        let outcome = sync
            .on_foreign_blocks(&mut ours, vec![theirs.last_block().clone()])
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Extended);
        assert_eq!(sync.state(), SyncState::Synced);
        assert_eq!(ours.blocks(), theirs.blocks());
    }

    #[test]
    fn test_stale_block_is_ahead() {
        let mut ours = ledger();
        grow(&mut ours, 2);
        let old = ours.blocks()[1].clone();

        let mut sync = PeerSync::new();
        assert_eq!(
            sync.on_foreign_blocks(&mut ours, vec![old]).unwrap(),
            SyncOutcome::Ahead
        );
        assert_eq!(ours.blocks().len(), 3);
    }

    #[test]
    fn test_gap_requests_then_replaces() {
        let mut ours = ledger();
        let mut theirs = ledger();
        grow(&mut theirs, 3);

        let mut sync = PeerSync::new();
        let outcome = sync
            .on_foreign_blocks(&mut ours, vec![theirs.last_block().clone()])
            .unwrap();
        assert_eq!(outcome, SyncOutcome::RequestFullChain);
        assert_eq!(sync.state(), SyncState::AwaitingFullChain);
        assert_eq!(ours.blocks().len(), 1);

        // Delivered out of order on purpose
        let mut full = theirs.blocks().to_vec();
        full.reverse();
        let outcome = sync.on_foreign_blocks(&mut ours, full).unwrap();
        assert_eq!(outcome, SyncOutcome::Extended);
        assert_eq!(ours.blocks(), theirs.blocks());

        // Replaying the same chain is a no-op
        let again = sync
            .on_foreign_blocks(&mut ours, theirs.blocks().to_vec())
            .unwrap();
        assert_eq!(again, SyncOutcome::Ahead);
    }

    #[test]
    fn test_invalid_chain_resets_state() {
        let mut ours = ledger();
        let mut theirs = ledger();
        grow(&mut theirs, 2);
        let mut broken = theirs.blocks().to_vec();
        broken.remove(0);

        let mut sync = PeerSync::new();
        let err = sync.on_foreign_blocks(&mut ours, broken).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Sequence));
        assert_eq!(sync.state(), SyncState::Idle);
        assert!(sync.on_foreign_blocks(&mut ours, vec![]).is_err());
    }
}
