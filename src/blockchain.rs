//! Chain manager and balance state.

pub mod chain;
pub mod state;

pub use chain::{Block, Blockchain, GENESIS_PREVIOUS_HASH};
pub use state::LedgerState;
