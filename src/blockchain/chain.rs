use crate::blockchain::state::LedgerState;
use crate::config::ChainConfig;
use crate::error::{ChainError, Result};
use crate::escrow::{ESCROW_CONTRACT_ADDRESS, MEDIATOR_ADDRESS};
use crate::hashing;
use crate::keyring::KeyRegistry;
use crate::mempool::Mempool;
use crate::miner;
use crate::transaction::validation;
use crate::transaction::{now_timestamp, Transaction, TxKind, COINBASE_SENDER};
use std::collections::HashSet;
use tracing::{info, warn};

/// Fixed seed constant for the genesis block's previous-hash field.
pub const GENESIS_PREVIOUS_HASH: &str = "1";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Block {
    /// 1-based sequential position in the chain.
    pub index: u64,
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub merkle_root: String,
    pub nonce: u64,
    /// Digest of the canonical serialization (excluding this field) with the
    /// required leading-zero prefix.
    #[serde(default)]
    pub hash: String,
}

impl Block {
    /// Recompute the block digest with the stored nonce, `hash` excluded.
    pub fn compute_hash(&self) -> Result<String> {
        hashing::canonical_hash_excluding(self, &["hash"])
    }

    fn is_genesis(&self) -> bool {
        self.index == 1
    }
}

/// The chain manager: owns the ordered block list, the mempool, the balance
/// state and the key registry. Monotonic append-only; there is no
/// reorganization.
#[derive(Debug, Clone)]
pub struct Blockchain {
    pub blocks: Vec<Block>,
    pub mempool: Mempool,
    pub state: LedgerState,
    pub keyring: KeyRegistry,
    config: ChainConfig,
    /// Content hashes of transfers emitted by the escrow contract's state
    /// machine. A contract transfer in a block is accepted only if it was
    /// recorded here when the contract emitted it.
    authorized_contract_txs: HashSet<String>,
}

impl Blockchain {
    /// Initialize a new chain with a sealed genesis block.
    pub fn new(config: ChainConfig) -> Result<Self> {
        let genesis = Self::create_genesis_block()?;
        info!(hash = %genesis.hash, "sealed genesis block");
        Ok(Blockchain {
            blocks: vec![genesis],
            mempool: Mempool::new(),
            state: LedgerState::new(),
            keyring: KeyRegistry::new(),
            config,
            authorized_contract_txs: HashSet::new(),
        })
    }

    fn create_genesis_block() -> Result<Block> {
        let template = Block {
            index: 1,
            timestamp: now_timestamp(),
            transactions: vec![],
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            merkle_root: hashing::merkle_root::<Transaction>(&[])?,
            nonce: 0,
            hash: String::new(),
        };
        miner::seal_block(template)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn head(&self) -> Result<&Block> {
        self.blocks
            .last()
            .ok_or_else(|| ChainError::ChainIntegrity("chain has no genesis block".to_string()))
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Current coinbase base reward under the halving schedule:
    /// `base_reward / 2^((chain_length - 1) / halving_blocks)`.
    /// A zero halving interval means the reward never halves; the config
    /// loader rejects it, but a hand-built config must not panic here.
    pub fn block_reward(&self) -> f64 {
        let halvings = match self.config.halving_blocks {
            0 => 0,
            interval => (self.blocks.len() as u64).saturating_sub(1) / interval,
        };
        if halvings >= 64 {
            0.0
        } else {
            self.config.base_reward / 2u64.pow(halvings as u32) as f64
        }
    }

    /// Validate and queue an externally submitted signed transaction.
    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<String> {
        self.mempool.admit(tx, &self.keyring, &self.state)
    }

    /// Queue a transfer emitted by the escrow contract and record its
    /// authorization. Contract transfers entering any other way are rejected
    /// at block verification.
    pub fn submit_contract_transfer(&mut self, tx: Transaction) -> Result<String> {
        if tx.kind != TxKind::ContractTransfer {
            return Err(ChainError::Validation(
                "only contract transfers can be queued with contract authorization".to_string(),
            ));
        }
        let hash = self.mempool.push_authorized(tx)?;
        self.authorized_contract_txs.insert(hash.clone());
        Ok(hash)
    }

    /// Mine a block from the fee-ordered mempool.
    ///
    /// Selection is funding-aware: signed transactions are taken in fee
    /// order first, and a contract transfer is included only when the
    /// contract address can cover it out of its confirmed balance plus the
    /// deposits already selected into this block. An unfunded payout stays
    /// queued for a later block instead of wedging every mining attempt on
    /// an insufficient-funds failure at apply time.
    pub fn mine_block(&mut self, miner_address: &str) -> Result<Block> {
        let snapshot = self.mempool.by_fee_desc();
        let budget = self.config.max_block_txs;
        let mut selected: Vec<usize> = Vec::new();
        let mut contract_funds = self.state.balance(ESCROW_CONTRACT_ADDRESS);

        for (index, tx) in snapshot.iter().enumerate() {
            if selected.len() == budget {
                break;
            }
            if tx.kind == TxKind::ContractTransfer {
                continue;
            }
            if tx.recipient == ESCROW_CONTRACT_ADDRESS {
                contract_funds += tx.amount;
            }
            selected.push(index);
        }
        for (index, tx) in snapshot.iter().enumerate() {
            if selected.len() == budget {
                break;
            }
            if tx.kind != TxKind::ContractTransfer {
                continue;
            }
            if contract_funds >= tx.total_debit() {
                contract_funds -= tx.total_debit();
                selected.push(index);
            }
        }
        // Keep the block's transaction order aligned with fee order.
        selected.sort_unstable();

        self.mine_block_with(miner_address, &selected)
    }

    /// Mine a block from explicitly selected indices into the fee-ordered
    /// mempool snapshot.
    ///
    /// All-or-nothing: either the chain gains exactly one fully verified
    /// block (balances and mempool updated atomically with the append), or
    /// an error is returned and nothing changed. Balance effects are staged
    /// on a copy and committed only after verification passes.
    pub fn mine_block_with(&mut self, miner_address: &str, selected: &[usize]) -> Result<Block> {
        if selected.len() > self.config.max_block_txs {
            return Err(ChainError::Validation(format!(
                "a block holds at most {} mempool transactions, {} selected",
                self.config.max_block_txs,
                selected.len()
            )));
        }

        let snapshot = self.mempool.by_fee_desc();
        let mut seen = HashSet::new();
        let mut chosen = Vec::with_capacity(selected.len());
        for &index in selected {
            if !seen.insert(index) {
                return Err(ChainError::Validation(format!(
                    "mempool index {} selected twice",
                    index
                )));
            }
            let tx = snapshot.get(index).cloned().ok_or_else(|| {
                ChainError::Validation(format!("mempool index {} out of range", index))
            })?;
            chosen.push(tx);
        }

        let total_fees: f64 = chosen.iter().map(|tx| tx.fee).sum();
        let coinbase = Transaction::coinbase(miner_address, self.block_reward() + total_fees);

        let mut transactions = Vec::with_capacity(chosen.len() + 1);
        transactions.push(coinbase.clone());
        transactions.extend(chosen);
        let merkle_root = hashing::merkle_root(&transactions)?;

        let head = self.head()?;
        let template = Block {
            index: head.index + 1,
            timestamp: now_timestamp(),
            transactions,
            previous_hash: head.hash.clone(),
            merkle_root,
            nonce: 0,
            hash: String::new(),
        };
        let block = miner::seal_block(template)?;

        // Stage balance effects on a copy. Deposits and normal transfers go
        // first, contract transfers second: a payout may rely on a deposit
        // landing in this very block.
        let mut staged = self.state.clone();
        for tx in block.transactions.iter().skip(1) {
            if tx.kind != TxKind::ContractTransfer {
                staged.apply_transaction(tx)?;
            }
        }
        for tx in block.transactions.iter().skip(1) {
            if tx.kind == TxKind::ContractTransfer {
                staged.apply_transaction(tx)?;
            }
        }
        // The miner is credited with the full coinbase amount, reward + fees.
        staged.apply_transaction(&coinbase)?;

        self.verify_block_against(&block, &staged)?;

        let included: Vec<String> = block.transactions[1..]
            .iter()
            .map(|tx| tx.tx_hash())
            .collect::<Result<_>>()?;

        // Commit: balances, mempool, chain.
        self.state = staged;
        for hash in &included {
            self.mempool.remove_transaction(hash);
        }
        self.blocks.push(block.clone());

        info!(
            index = block.index,
            txs = block.transactions.len(),
            reward = coinbase.amount,
            "mined and appended block"
        );
        Ok(block)
    }

    /// Structural block verification against the current balance state.
    /// The genesis block is always valid.
    pub fn verify_block(&self, block: &Block) -> Result<()> {
        self.verify_block_against(block, &self.state)
    }

    fn verify_block_against(&self, block: &Block, state: &LedgerState) -> Result<()> {
        if block.is_genesis() {
            return Ok(());
        }

        let first = block.transactions.first().ok_or_else(|| {
            ChainError::ChainIntegrity("non-genesis block has no transactions".to_string())
        })?;
        if first.kind != TxKind::Coinbase || first.sender != COINBASE_SENDER {
            return Err(ChainError::ChainIntegrity(
                "first transaction in a block must be the coinbase".to_string(),
            ));
        }

        for tx in &block.transactions[1..] {
            match tx.kind {
                TxKind::Coinbase => {
                    return Err(ChainError::ChainIntegrity(
                        "coinbase transaction outside the first slot".to_string(),
                    ));
                }
                TxKind::ContractTransfer => {
                    if tx.sender != ESCROW_CONTRACT_ADDRESS {
                        return Err(ChainError::ChainIntegrity(
                            "contract transfer from a non-contract sender".to_string(),
                        ));
                    }
                    if tx.recipient != MEDIATOR_ADDRESS && !state.is_known(&tx.recipient) {
                        return Err(ChainError::ChainIntegrity(format!(
                            "contract transfer to unknown recipient {}",
                            tx.recipient
                        )));
                    }
                    let hash = tx.tx_hash()?;
                    if !self.authorized_contract_txs.contains(&hash) {
                        return Err(ChainError::ChainIntegrity(
                            "contract transfer was not emitted by the contract".to_string(),
                        ));
                    }
                }
                TxKind::Normal | TxKind::EscrowDeposit => {
                    validation::verify_sender_signature(tx, &self.keyring).map_err(|e| {
                        ChainError::ChainIntegrity(format!(
                            "block contains an invalid transaction: {}",
                            e
                        ))
                    })?;
                }
            }
        }

        let expected_root = hashing::merkle_root(&block.transactions)?;
        if expected_root != block.merkle_root {
            return Err(ChainError::ChainIntegrity(format!(
                "merkle root mismatch: expected {}, stored {}",
                expected_root, block.merkle_root
            )));
        }

        Ok(())
    }

    /// Full-chain validation, fail-fast. A single-block chain is trivially
    /// valid; every later block must verify structurally, its recomputed
    /// hash (same nonce, hash field excluded) must match the stored one and
    /// meet the difficulty prefix, and its previous-hash must link to the
    /// preceding block's stored hash.
    pub fn validate_chain(&self) -> bool {
        if self.blocks.len() <= 1 {
            return true;
        }

        for (position, block) in self.blocks.iter().enumerate().skip(1) {
            if let Err(e) = self.verify_block(block) {
                warn!(index = block.index, error = %e, "chain validation failed");
                return false;
            }
            match block.compute_hash() {
                Ok(recomputed)
                    if recomputed == block.hash && miner::meets_difficulty(&block.hash) => {}
                _ => {
                    warn!(index = block.index, "stored block hash does not match content");
                    return false;
                }
            }
            if block.previous_hash != self.blocks[position - 1].hash {
                warn!(index = block.index, "broken hash chain linkage");
                return false;
            }
        }
        true
    }
}
