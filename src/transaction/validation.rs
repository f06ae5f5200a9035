/// Validation logic for transactions separated from type definitions
use crate::crypto;
use crate::error::{ChainError, Result};
use crate::keyring::KeyRegistry;
use crate::transaction::types::{Transaction, TxKind, COINBASE_SENDER};

/// Pool-admission validation: structural checks plus signature verification
/// against the sender's registered public key. Fails closed on any missing
/// field or verification failure.
///
/// The reward sentinel sender "0" is always accepted (coinbase transactions
/// are built by the chain manager itself). Contract transfers never enter
/// through here: they are pushed by the escrow contract with their own
/// authorization.
pub fn validate_for_pool(tx: &Transaction, keyring: &KeyRegistry) -> Result<()> {
    if tx.sender == COINBASE_SENDER {
        return Ok(());
    }

    check_amounts(tx)?;

    match tx.kind {
        TxKind::Normal | TxKind::EscrowDeposit => verify_sender_signature(tx, keyring),
        TxKind::ContractTransfer => Err(ChainError::Validation(
            "contract transfers are emitted by the escrow contract, not submitted".to_string(),
        )),
        // Unreachable in practice: coinbase always carries the "0" sender.
        TxKind::Coinbase => Err(ChainError::Validation(
            "coinbase transaction with a non-sentinel sender".to_string(),
        )),
    }
}

/// Verify a sender-signed transaction against the key registry. Shared by
/// pool admission and block verification.
pub fn verify_sender_signature(tx: &Transaction, keyring: &KeyRegistry) -> Result<()> {
    let signature_hex = tx
        .signature
        .as_ref()
        .ok_or_else(|| ChainError::Signature("transaction is not signed".to_string()))?;

    let public_key = keyring.lookup(&tx.sender).ok_or_else(|| {
        ChainError::Signature(format!("no public key registered for sender {}", tx.sender))
    })?;

    let signature_bytes = hex::decode(signature_hex)
        .map_err(|e| ChainError::Signature(format!("signature is not valid hex: {}", e)))?;

    crypto::verify_signature(public_key, &tx.signable_bytes()?, &signature_bytes)
}

fn check_amounts(tx: &Transaction) -> Result<()> {
    if !tx.amount.is_finite() || tx.amount < 0.0 {
        return Err(ChainError::Validation(format!(
            "transaction amount must be a non-negative number, got {}",
            tx.amount
        )));
    }
    if !tx.fee.is_finite() || tx.fee < 0.0 {
        return Err(ChainError::Validation(format!(
            "transaction fee must be a non-negative number, got {}",
            tx.fee
        )));
    }
    if tx.recipient.is_empty() {
        return Err(ChainError::Validation(
            "transaction recipient cannot be empty".to_string(),
        ));
    }
    Ok(())
}
