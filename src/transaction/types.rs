/// Transaction types for Pactchain
use crate::crypto::{Address, KeyPair};
use crate::error::{ChainError, Result};
use crate::hashing;
use serde::{Deserialize, Serialize};

/// Sender sentinel for coinbase (reward) transactions.
pub const COINBASE_SENDER: &str = "0";

/// Wire value carried in the signature field of contract transfers. Kept for
/// observable compatibility; acceptance is decided by the transaction kind
/// plus the contract-emission authorization set, never by this string.
pub const CONTRACT_SIGNATURE_SENTINEL: &str = "VALID";

/// Current wall-clock time as float seconds, the transaction timestamp unit.
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Discriminates how a transaction is authorized and applied. Every branch on
/// behavior (application order, verification rules) matches this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    /// Ordinary signed transfer between two addresses.
    Normal,
    /// Reward transaction, always first in a block, sender "0".
    Coinbase,
    /// Payout emitted by the escrow contract's state machine.
    ContractTransfer,
    /// Buyer's signed deposit locking funds at the contract address.
    EscrowDeposit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Address,
    pub recipient: Address,
    /// Non-negative decimal amount credited to the recipient.
    pub amount: f64,
    /// Non-negative mining fee, debited from the sender on top of `amount`.
    #[serde(default)]
    pub fee: f64,
    /// Creation time, float seconds.
    pub timestamp: f64,
    /// Compact ECDSA signature as hex; the contract sentinel for contract
    /// transfers; absent for coinbase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(rename = "type")]
    pub kind: TxKind,
}

impl Transaction {
    /// An unsigned normal transfer, timestamped now.
    pub fn normal(sender: &str, recipient: &str, amount: f64, fee: f64) -> Self {
        Transaction {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
            fee,
            timestamp: now_timestamp(),
            signature: None,
            kind: TxKind::Normal,
        }
    }

    /// The reward transaction prepended to every mined block.
    pub fn coinbase(recipient: &str, amount: f64) -> Self {
        Transaction {
            sender: COINBASE_SENDER.to_string(),
            recipient: recipient.to_string(),
            amount,
            fee: 0.0,
            timestamp: now_timestamp(),
            signature: None,
            kind: TxKind::Coinbase,
        }
    }

    /// An unsigned escrow deposit from the buyer to the contract address.
    pub fn escrow_deposit(buyer: &str, contract: &str, amount: f64, fee: f64) -> Self {
        Transaction {
            sender: buyer.to_string(),
            recipient: contract.to_string(),
            amount,
            fee,
            timestamp: now_timestamp(),
            signature: None,
            kind: TxKind::EscrowDeposit,
        }
    }

    /// A payout authorized by the escrow contract's own state machine.
    pub fn contract_transfer(contract: &str, recipient: &str, amount: f64, fee: f64) -> Self {
        Transaction {
            sender: contract.to_string(),
            recipient: recipient.to_string(),
            amount,
            fee,
            timestamp: now_timestamp(),
            signature: Some(CONTRACT_SIGNATURE_SENTINEL.to_string()),
            kind: TxKind::ContractTransfer,
        }
    }

    /// Total debited from the sender when this transaction is applied.
    pub fn total_debit(&self) -> f64 {
        self.amount + self.fee
    }

    /// Canonical bytes the sender signs: the transaction's canonical JSON
    /// with the `signature` field removed.
    pub fn signable_bytes(&self) -> Result<Vec<u8>> {
        Ok(hashing::canonical_json_excluding(self, &["signature"])?.into_bytes())
    }

    /// Content hash over the full record, the transaction's identity in the
    /// mempool, Merkle leaves and the contract authorization set.
    pub fn tx_hash(&self) -> Result<String> {
        hashing::canonical_hash(self)
    }

    /// Sign in place with the given key pair. Only sender-authorized kinds
    /// carry real signatures.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<()> {
        match self.kind {
            TxKind::Normal | TxKind::EscrowDeposit => {
                let signature = keypair.sign(&self.signable_bytes()?)?;
                self.signature = Some(hex::encode(signature));
                Ok(())
            }
            TxKind::Coinbase | TxKind::ContractTransfer => Err(ChainError::Validation(
                "only normal and escrow-deposit transactions are signed by a sender".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coinbase_shape() {
        let tx = Transaction::coinbase("miner", 10.5);
        assert_eq!(tx.sender, COINBASE_SENDER);
        assert_eq!(tx.kind, TxKind::Coinbase);
        assert!(tx.signature.is_none());
        assert_eq!(tx.total_debit(), 10.5);
    }

    #[test]
    fn test_signable_bytes_exclude_signature() {
        let mut tx = Transaction::normal("a", "b", 1.0, 0.1);
        let unsigned = tx.signable_bytes().unwrap();
        tx.signature = Some("aa".repeat(64));
        let signed = tx.signable_bytes().unwrap();
        assert_eq!(unsigned, signed);
    }

    #[test]
    fn test_tx_hash_covers_signature() {
        let mut tx = Transaction::normal("a", "b", 1.0, 0.1);
        let before = tx.tx_hash().unwrap();
        tx.signature = Some("aa".repeat(64));
        let after = tx.tx_hash().unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_sign_rejects_privileged_kinds() {
        let keypair = KeyPair::generate().unwrap();
        let mut coinbase = Transaction::coinbase("miner", 1.0);
        assert!(coinbase.sign(&keypair).is_err());

        let mut transfer = Transaction::contract_transfer("contract", "seller", 1.0, 0.1);
        assert!(transfer.sign(&keypair).is_err());
        // The wire sentinel stays in place regardless
        assert_eq!(
            transfer.signature.as_deref(),
            Some(CONTRACT_SIGNATURE_SENTINEL)
        );
    }

    #[test]
    fn test_kind_serializes_as_type_field() {
        let tx = Transaction::normal("a", "b", 1.0, 0.0);
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["type"], "normal");
        let transfer = Transaction::contract_transfer("c", "d", 1.0, 0.0);
        let value = serde_json::to_value(&transfer).unwrap();
        assert_eq!(value["type"], "contract_transfer");
    }

    #[test]
    fn test_fee_defaults_to_zero_on_deserialize() {
        let tx: Transaction = serde_json::from_value(serde_json::json!({
            "sender": "a",
            "recipient": "b",
            "amount": 2.0,
            "timestamp": 1.0,
            "type": "normal"
        }))
        .unwrap();
        assert_eq!(tx.fee, 0.0);
    }
}
