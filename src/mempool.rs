//! Pending-transaction pool.
//!
//! Admission re-validates signatures and enforces the available-balance rule:
//! a sender cannot queue transactions whose combined amount+fee exceeds the
//! confirmed balance, even if each one alone would fit. Balances themselves
//! are only mutated at block-application time, never here.

use crate::blockchain::state::LedgerState;
use crate::error::{ChainError, Result};
use crate::keyring::KeyRegistry;
use crate::transaction::{validate_for_pool, Transaction, COINBASE_SENDER};

#[derive(Debug, Clone)]
struct PoolEntry {
    hash: String,
    tx: Transaction,
}

#[derive(Debug, Clone, Default)]
pub struct Mempool {
    entries: Vec<PoolEntry>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate and queue an externally submitted transaction.
    ///
    /// The reward sentinel sender "0" is exempt from the balance check; it
    /// never debits anyone when applied.
    pub fn admit(
        &mut self,
        tx: Transaction,
        keyring: &KeyRegistry,
        state: &LedgerState,
    ) -> Result<String> {
        validate_for_pool(&tx, keyring)?;

        if tx.sender != COINBASE_SENDER {
            let available = self.available_balance(&tx.sender, state);
            let needed = tx.total_debit();
            if needed > available {
                return Err(ChainError::InsufficientFunds { needed, available });
            }
        }

        self.push(tx)
    }

    /// Queue a transaction emitted by the escrow contract's state machine.
    /// No signature path: authorization is the emission itself, recorded by
    /// the chain manager.
    pub fn push_authorized(&mut self, tx: Transaction) -> Result<String> {
        self.push(tx)
    }

    fn push(&mut self, tx: Transaction) -> Result<String> {
        let hash = tx.tx_hash()?;
        self.entries.push(PoolEntry {
            hash: hash.clone(),
            tx,
        });
        Ok(hash)
    }

    /// Confirmed balance minus what the sender has already committed to
    /// queued transactions.
    pub fn available_balance(&self, sender: &str, state: &LedgerState) -> f64 {
        state.balance(sender) - self.committed_for(sender)
    }

    /// Sum of amount+fee over queued transactions from this sender.
    pub fn committed_for(&self, sender: &str) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.tx.sender == sender)
            .map(|e| e.tx.total_debit())
            .sum()
    }

    /// Snapshot ordered by fee descending, miner-optimal. The sort is stable,
    /// so fee ties keep their insertion order.
    pub fn by_fee_desc(&self) -> Vec<Transaction> {
        let mut snapshot: Vec<Transaction> = self.entries.iter().map(|e| e.tx.clone()).collect();
        snapshot.sort_by(|a, b| {
            b.fee
                .partial_cmp(&a.fee)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        snapshot
    }

    /// Remove the first queued transaction with this content hash. Duplicates
    /// by identity are resolved here: one removal per inclusion.
    pub fn remove_transaction(&mut self, hash: &str) -> bool {
        match self.entries.iter().position(|e| e.hash == hash) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.entries.iter().any(|e| e.hash == hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn funded_sender(
        keyring: &mut KeyRegistry,
        state: &mut LedgerState,
        balance: f64,
    ) -> (KeyPair, String) {
        let keypair = KeyPair::generate().unwrap();
        let address = keyring.register(&keypair.public_key_bytes()).unwrap();
        state.credit(&address, balance);
        (keypair, address)
    }

    fn signed_tx(keypair: &KeyPair, sender: &str, amount: f64, fee: f64) -> Transaction {
        let mut tx = Transaction::normal(sender, "recipient", amount, fee);
        tx.sign(keypair).unwrap();
        tx
    }

    #[test]
    fn test_admit_and_remove() {
        let mut keyring = KeyRegistry::new();
        let mut state = LedgerState::new();
        let (keypair, address) = funded_sender(&mut keyring, &mut state, 10.0);

        let mut pool = Mempool::new();
        let hash = pool
            .admit(signed_tx(&keypair, &address, 4.0, 0.5), &keyring, &state)
            .unwrap();

        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&hash));
        assert!(pool.remove_transaction(&hash));
        assert!(pool.is_empty());
        assert!(!pool.remove_transaction(&hash));
    }

    #[test]
    fn test_double_spend_across_pool_rejected() {
        let mut keyring = KeyRegistry::new();
        let mut state = LedgerState::new();
        let (keypair, address) = funded_sender(&mut keyring, &mut state, 10.0);

        let mut pool = Mempool::new();
        // First transaction alone fits
        pool.admit(signed_tx(&keypair, &address, 6.0, 0.5), &keyring, &state)
            .unwrap();

        // Second alone would also fit, but combined they overspend
        let err = pool
            .admit(signed_tx(&keypair, &address, 6.0, 0.5), &keyring, &state)
            .unwrap_err();
        assert!(matches!(err, ChainError::InsufficientFunds { .. }));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_available_balance_accounts_for_queued() {
        let mut keyring = KeyRegistry::new();
        let mut state = LedgerState::new();
        let (keypair, address) = funded_sender(&mut keyring, &mut state, 10.0);

        let mut pool = Mempool::new();
        assert_eq!(pool.available_balance(&address, &state), 10.0);

        pool.admit(signed_tx(&keypair, &address, 3.0, 1.0), &keyring, &state)
            .unwrap();
        assert_eq!(pool.available_balance(&address, &state), 6.0);
        assert_eq!(pool.committed_for(&address), 4.0);
    }

    #[test]
    fn test_fee_ordering_is_stable() {
        let mut keyring = KeyRegistry::new();
        let mut state = LedgerState::new();
        let (keypair, address) = funded_sender(&mut keyring, &mut state, 100.0);

        let mut pool = Mempool::new();
        let low_first = signed_tx(&keypair, &address, 1.0, 0.1);
        let high = signed_tx(&keypair, &address, 1.0, 2.0);
        let low_second = signed_tx(&keypair, &address, 2.0, 0.1);
        pool.admit(low_first.clone(), &keyring, &state).unwrap();
        pool.admit(high.clone(), &keyring, &state).unwrap();
        pool.admit(low_second.clone(), &keyring, &state).unwrap();

        let ordered = pool.by_fee_desc();
        assert_eq!(ordered[0].fee, 2.0);
        // Fee ties keep insertion order
        assert_eq!(ordered[1].amount, 1.0);
        assert_eq!(ordered[2].amount, 2.0);
    }

    #[test]
    fn test_admission_rejects_unsigned() {
        let mut keyring = KeyRegistry::new();
        let mut state = LedgerState::new();
        let (_, address) = funded_sender(&mut keyring, &mut state, 10.0);

        let mut pool = Mempool::new();
        let tx = Transaction::normal(&address, "recipient", 1.0, 0.0);
        assert!(pool.admit(tx, &keyring, &state).is_err());
        assert!(pool.is_empty());
    }
}
