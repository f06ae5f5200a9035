use crate::crypto::Address;
use crate::error::{ChainError, Result};
use crate::transaction::{Transaction, TxKind};
use std::collections::HashMap;

/// Per-address balance map. Mutated exclusively when a block is applied,
/// with one documented exception: escrow timeout refunds credit the buyer
/// directly (see `escrow::EscrowRegistry::check_timeouts`).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct LedgerState {
    pub balances: HashMap<Address, f64>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, address: &str) -> f64 {
        self.balances.get(address).copied().unwrap_or(0.0)
    }

    /// Whether the address has ever held a balance entry.
    pub fn is_known(&self, address: &str) -> bool {
        self.balances.contains_key(address)
    }

    pub fn credit(&mut self, address: &str, amount: f64) {
        *self.balances.entry(address.to_string()).or_insert(0.0) += amount;
    }

    /// Apply a single transaction's balance effects. Defense in depth: the
    /// mempool already enforced available balance at admission, but the
    /// sender's funds are re-checked here at apply time.
    ///
    /// The fee is debited from the sender and credited to no one; the miner
    /// is paid reward plus fees through the coinbase instead.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<()> {
        match tx.kind {
            TxKind::Coinbase => {
                self.credit(&tx.recipient, tx.amount);
                Ok(())
            }
            TxKind::Normal | TxKind::EscrowDeposit => self.debit_and_credit(tx),
            // Same balance mechanics, but the sender is the contract address
            // paying out previously deposited funds.
            TxKind::ContractTransfer => self.debit_and_credit(tx),
        }
    }

    fn debit_and_credit(&mut self, tx: &Transaction) -> Result<()> {
        let needed = tx.total_debit();
        let available = self.balance(&tx.sender);
        if needed > available {
            return Err(ChainError::InsufficientFunds { needed, available });
        }
        self.balances.insert(tx.sender.clone(), available - needed);
        self.credit(&tx.recipient, tx.amount);
        Ok(())
    }
}
