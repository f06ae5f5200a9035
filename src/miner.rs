//! Proof-of-work block sealing.
//!
//! Sealing is an isolated step with a clear pre/post boundary: it takes a
//! fully assembled block (every field but `hash` final) and returns the same
//! block with the winning nonce and digest filled in. The surrounding ledger
//! state must be frozen by the caller for the duration of the search.

use crate::blockchain::chain::Block;
use crate::error::Result;

/// Required leading-zero prefix of a sealed block's hex digest. Four hex
/// zeros, 16 bits of difficulty. Fixed global constant; there is no
/// retargeting.
pub const DIFFICULTY_PREFIX: &str = "0000";

pub fn meets_difficulty(hash: &str) -> bool {
    hash.starts_with(DIFFICULTY_PREFIX)
}

/// Linear nonce search from zero. Unbounded on purpose, mirroring real
/// proof-of-work; at the fixed difficulty it terminates quickly in practice.
/// Deterministic for identical content bytes.
pub fn seal_block(mut block: Block) -> Result<Block> {
    let mut nonce: u64 = 0;
    loop {
        block.nonce = nonce;
        let digest = block.compute_hash()?;
        if meets_difficulty(&digest) {
            block.hash = digest;
            return Ok(block);
        }
        nonce += 1;
    }
}
