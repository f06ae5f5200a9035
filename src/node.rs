//! Single-writer ledger facade.
//!
//! The whole mutable ledger (chain, mempool, balances, escrow registry) lives
//! behind one mutex: one logical mutator at a time, exactly the concurrency
//! model the core assumes. The node is constructed explicitly from a config
//! by the process entry point and threaded through; there is no global state.

use crate::blockchain::{Block, Blockchain};
use crate::config::Config;
use crate::crypto::{Address, KeyPair};
use crate::error::Result;
use crate::escrow::{Agreement, EscrowRegistry};
use crate::transaction::Transaction;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

/// Everything a single writer mutates together.
struct Ledger {
    chain: Blockchain,
    escrow: EscrowRegistry,
}

/// Snapshot of the chain for the serving shell.
#[derive(Debug, Clone, Serialize)]
pub struct ChainSnapshot {
    pub blocks: Vec<Block>,
    pub length: usize,
}

/// Snapshot of the pending pool, fee-ordered, plus the current reward.
#[derive(Debug, Clone, Serialize)]
pub struct MempoolSnapshot {
    pub pending: Vec<Transaction>,
    pub block_reward: f64,
}

/// Keys handed out by the wallet issuer. The secret key is returned once and
/// not retained by the node.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedWallet {
    pub secret_key: String,
    pub address: Address,
}

pub struct Node {
    config: Config,
    ledger: Mutex<Ledger>,
}

impl Node {
    pub fn new(config: Config) -> Result<Self> {
        let chain = Blockchain::new(config.chain.clone())?;
        let escrow = EscrowRegistry::new(config.escrow.clone());
        info!("ledger node initialized with genesis chain");
        Ok(Node {
            config,
            ledger: Mutex::new(Ledger { chain, escrow }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Generate a fresh keypair, register its public key and credit the
    /// faucet amount so the new address can transact.
    pub fn issue_wallet(&self) -> Result<IssuedWallet> {
        let keypair = KeyPair::generate()?;
        let address = self.register_key(&keypair.public_key_bytes())?;
        Ok(IssuedWallet {
            secret_key: hex::encode(keypair.secret_key.secret_bytes()),
            address,
        })
    }

    /// Register an externally generated public key. New addresses receive
    /// the faucet credit once; re-registration is a no-op.
    pub fn register_key(&self, public_key_bytes: &[u8]) -> Result<Address> {
        let mut ledger = self.ledger.lock();
        let fresh = {
            let address = crate::crypto::derive_address(public_key_bytes);
            !ledger.chain.keyring.contains(&address)
        };
        let address = ledger.chain.keyring.register(public_key_bytes)?;
        if fresh && self.config.chain.faucet_amount > 0.0 {
            ledger
                .chain
                .state
                .credit(&address, self.config.chain.faucet_amount);
            info!(address = %address, amount = self.config.chain.faucet_amount, "faucet credit for new key");
        }
        Ok(address)
    }

    /// Validate and queue a signed transaction; returns its content hash.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<String> {
        self.ledger.lock().chain.submit_transaction(tx)
    }

    /// Run the escrow timeout sweep, then mine one block from the top of the
    /// fee-ordered mempool.
    pub fn mine(&self, miner_address: &str) -> Result<Block> {
        let mut guard = self.ledger.lock();
        let ledger = &mut *guard;
        ledger.escrow.check_timeouts(&mut ledger.chain);
        ledger.chain.mine_block(miner_address)
    }

    pub fn create_escrow(
        &self,
        buyer: &str,
        seller: &str,
        amount: f64,
        description: &str,
        buyer_secret_hex: &str,
    ) -> Result<String> {
        let mut guard = self.ledger.lock();
        let ledger = &mut *guard;
        ledger
            .escrow
            .create_agreement(&mut ledger.chain, buyer, seller, amount, description, buyer_secret_hex)
    }

    pub fn confirm_seller_participation(&self, id: &str, actor: &str) -> Result<()> {
        self.ledger.lock().escrow.confirm_seller_participation(id, actor)
    }

    pub fn confirm_shipment(&self, id: &str, actor: &str, tracking: Option<String>) -> Result<()> {
        self.ledger.lock().escrow.confirm_shipment(id, actor, tracking)
    }

    pub fn confirm_delivery(&self, id: &str, actor: &str) -> Result<()> {
        let mut guard = self.ledger.lock();
        let ledger = &mut *guard;
        ledger.escrow.confirm_delivery(&mut ledger.chain, id, actor)
    }

    pub fn raise_dispute(&self, id: &str, actor: &str) -> Result<()> {
        self.ledger.lock().escrow.raise_dispute(id, actor)
    }

    // ------------------------------------------------------------------
    // Read-only snapshots for the serving shell
    // ------------------------------------------------------------------

    pub fn chain_snapshot(&self) -> ChainSnapshot {
        let ledger = self.ledger.lock();
        ChainSnapshot {
            blocks: ledger.chain.blocks.clone(),
            length: ledger.chain.len(),
        }
    }

    pub fn mempool_snapshot(&self) -> MempoolSnapshot {
        let ledger = self.ledger.lock();
        MempoolSnapshot {
            pending: ledger.chain.mempool.by_fee_desc(),
            block_reward: ledger.chain.block_reward(),
        }
    }

    pub fn balance(&self, address: &str) -> f64 {
        self.ledger.lock().chain.state.balance(address)
    }

    pub fn agreements(&self) -> Vec<Agreement> {
        self.ledger.lock().escrow.agreements().to_vec()
    }

    pub fn agreement(&self, id: &str) -> Option<Agreement> {
        self.ledger.lock().escrow.agreement(id).cloned()
    }

    /// Full-chain validation, as exposed to operators.
    pub fn validate(&self) -> bool {
        self.ledger.lock().chain.validate_chain()
    }
}
