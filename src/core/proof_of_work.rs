use crate::core::difficulty::meets_target;
use crate::core::Block;
use crate::error::Result;
use crate::utils::hash;
use log::debug;

pub struct ProofOfWork {
    block: Block,
    prefix: String,
    target: u64,
}

const MAX_NONCE: u64 = u64::MAX;

impl ProofOfWork {
    pub fn new_proof_of_work(block: Block, target: u64) -> Result<ProofOfWork> {
        let prefix = block.hash_prefix()?;
        Ok(ProofOfWork {
            block,
            prefix,
            target,
        })
    }

    /// Whether the stored hash of `block` sits below `target`
    pub fn validate(block: &Block, target: u64) -> bool {
        meets_target(block.get_hash(), target)
    }

    fn prepare_data(&self, nonce: u64) -> String {
        format!("{}{}", self.prefix, nonce)
    }

    /// Searches nonces from zero and returns the sealed block
    pub fn run(self) -> Block {
        let mut nonce = 0;
        let mut digest = hash(&self.prepare_data(nonce));
        while !meets_target(&digest, self.target) && nonce < MAX_NONCE {
            nonce += 1;
            digest = hash(&self.prepare_data(nonce));
        }
        let mut block = self.block;
        debug!("Found nonce {nonce} for block {}", block.get_index());
        block.seal(nonce, digest);
        block
    }
}
