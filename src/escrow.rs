//! Escrow agreement state machine.
//!
//! An agreement locks buyer funds at the contract address through an ordinary
//! mined deposit, then walks `PENDING_SELLER_CONFIRMATION -> AWAITING_SHIPMENT
//! -> SHIPPED -> COMPLETED`, with `DISPUTED` reachable from any non-terminal
//! state and `REFUNDED` via timeout. Confirmed delivery emits contract
//! transfers into the mempool; the chain manager accepts them because the
//! contract recorded them as authorized, not because of any signature.

use crate::blockchain::Blockchain;
use crate::config::EscrowConfig;
use crate::crypto::{Address, KeyPair};
use crate::error::{ChainError, Result};
use crate::hashing;
use crate::transaction::{now_timestamp, Transaction};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// The contract's fixed ledger address. Deposits land here and payouts are
/// debited from here; it is a balance-holding address like any other.
pub const ESCROW_CONTRACT_ADDRESS: &str = "escrow_contract";

/// Ledger address credited with mediator fees on completed agreements.
pub const MEDIATOR_ADDRESS: &str = "mediator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowStatus {
    PendingSellerConfirmation,
    AwaitingShipment,
    Shipped,
    Completed,
    Disputed,
    Refunded,
}

impl EscrowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EscrowStatus::Completed | EscrowStatus::Refunded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agreement {
    /// Content-derived identifier: hash over buyer, seller and creation time.
    pub id: String,
    pub buyer: Address,
    pub seller: Address,
    pub amount: f64,
    pub mediator_fee: f64,
    /// Mining fees reserved up front: the deposit's fee plus two release
    /// fees for the payout transfers.
    pub reserved_mining_fees: f64,
    pub description: String,
    pub status: EscrowStatus,
    pub created_at_block: u64,
    pub timeout_block: u64,
    pub shipped: bool,
    pub delivery_confirmed: bool,
    pub tracking_info: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EscrowRegistry {
    agreements: Vec<Agreement>,
    config: EscrowConfig,
}

impl EscrowRegistry {
    pub fn new(config: EscrowConfig) -> Self {
        EscrowRegistry {
            agreements: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    pub fn agreements(&self) -> &[Agreement] {
        &self.agreements
    }

    pub fn agreement(&self, id: &str) -> Option<&Agreement> {
        self.agreements.iter().find(|a| a.id == id)
    }

    fn agreement_mut(&mut self, id: &str) -> Result<&mut Agreement> {
        self.agreements
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| ChainError::EscrowNotFound(id.to_string()))
    }

    /// Create an agreement and queue the buyer's deposit.
    ///
    /// The deposit moves `amount + mediator_fee + 2 * release_fee` to the
    /// contract address with the initial mining fee attached, signed on the
    /// buyer's behalf with the supplied secret key. The buyer's available
    /// balance must cover the deposit plus its fee up front.
    pub fn create_agreement(
        &mut self,
        chain: &mut Blockchain,
        buyer: &str,
        seller: &str,
        amount: f64,
        description: &str,
        buyer_secret_hex: &str,
    ) -> Result<String> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ChainError::Validation(format!(
                "escrow amount must be positive, got {}",
                amount
            )));
        }
        if buyer == seller {
            return Err(ChainError::Validation(
                "buyer and seller cannot be the same address".to_string(),
            ));
        }

        let keypair = KeyPair::from_secret_hex(buyer_secret_hex)?;
        if keypair.address() != buyer {
            return Err(ChainError::Signature(
                "supplied key does not match the buyer address".to_string(),
            ));
        }

        let mediator_fee = amount * self.config.mediator_rate;
        let initial_mining_fee = amount * self.config.initial_fee_rate;
        let release_fees = self.config.release_fee * 2.0;
        let required = amount + mediator_fee + initial_mining_fee + release_fees;

        let available = chain.mempool.available_balance(buyer, &chain.state);
        if required > available {
            return Err(ChainError::InsufficientFunds {
                needed: required,
                available,
            });
        }

        let mut deposit = Transaction::escrow_deposit(
            buyer,
            ESCROW_CONTRACT_ADDRESS,
            amount + mediator_fee + release_fees,
            initial_mining_fee,
        );
        deposit.sign(&keypair)?;
        chain.submit_transaction(deposit)?;

        let created_at_block = chain.len() as u64;
        let id = hashing::canonical_hash(&serde_json::json!({
            "buyer": buyer,
            "seller": seller,
            "timestamp": now_timestamp(),
        }))?;

        let agreement = Agreement {
            id: id.clone(),
            buyer: buyer.to_string(),
            seller: seller.to_string(),
            amount,
            mediator_fee,
            reserved_mining_fees: initial_mining_fee + release_fees,
            description: description.to_string(),
            status: EscrowStatus::PendingSellerConfirmation,
            created_at_block,
            timeout_block: created_at_block + self.config.timeout_blocks,
            shipped: false,
            delivery_confirmed: false,
            tracking_info: None,
        };
        info!(id = %agreement.id, buyer, seller, amount, "created escrow agreement");
        self.agreements.push(agreement);
        Ok(id)
    }

    /// Seller accepts the agreement. Pure state transition.
    pub fn confirm_seller_participation(&mut self, id: &str, actor: &str) -> Result<()> {
        let agreement = self.agreement_mut(id)?;
        if actor != agreement.seller {
            return Err(ChainError::Validation(
                "only the seller can confirm participation".to_string(),
            ));
        }
        if agreement.status != EscrowStatus::PendingSellerConfirmation {
            return Err(wrong_state("confirm participation", agreement.status));
        }
        agreement.status = EscrowStatus::AwaitingShipment;
        info!(id, "seller confirmed escrow participation");
        Ok(())
    }

    /// Seller marks the goods as shipped. Pure state transition.
    pub fn confirm_shipment(&mut self, id: &str, actor: &str, tracking: Option<String>) -> Result<()> {
        let agreement = self.agreement_mut(id)?;
        if actor != agreement.seller {
            return Err(ChainError::Validation(
                "only the seller can confirm shipment".to_string(),
            ));
        }
        if agreement.status != EscrowStatus::AwaitingShipment {
            return Err(wrong_state("confirm shipment", agreement.status));
        }
        agreement.status = EscrowStatus::Shipped;
        agreement.shipped = true;
        agreement.tracking_info = tracking;
        info!(id, "seller confirmed shipment");
        Ok(())
    }

    /// Buyer confirms delivery: emits the payout transfers (seller gets the
    /// amount, the mediator its fee, each carrying the pre-agreed release
    /// fee) into the mempool and completes the agreement.
    pub fn confirm_delivery(&mut self, chain: &mut Blockchain, id: &str, actor: &str) -> Result<()> {
        let (seller, amount, mediator_fee) = {
            let agreement = self.agreement_mut(id)?;
            if actor != agreement.buyer {
                return Err(ChainError::Validation(
                    "only the buyer can confirm delivery".to_string(),
                ));
            }
            if agreement.status != EscrowStatus::Shipped {
                return Err(wrong_state("confirm delivery", agreement.status));
            }
            (agreement.seller.clone(), agreement.amount, agreement.mediator_fee)
        };

        let release_fee = self.config.release_fee;
        chain.submit_contract_transfer(Transaction::contract_transfer(
            ESCROW_CONTRACT_ADDRESS,
            &seller,
            amount,
            release_fee,
        ))?;
        chain.submit_contract_transfer(Transaction::contract_transfer(
            ESCROW_CONTRACT_ADDRESS,
            MEDIATOR_ADDRESS,
            mediator_fee,
            release_fee,
        ))?;

        let agreement = self.agreement_mut(id)?;
        agreement.delivery_confirmed = true;
        agreement.status = EscrowStatus::Completed;
        info!(id, "delivery confirmed, payout transfers queued");
        Ok(())
    }

    /// Buyer or seller raises a dispute; allowed from any non-terminal,
    /// non-disputed state. An expired dispute is resolved by the timeout
    /// sweep like any other stalled agreement.
    pub fn raise_dispute(&mut self, id: &str, actor: &str) -> Result<()> {
        let agreement = self.agreement_mut(id)?;
        if actor != agreement.buyer && actor != agreement.seller {
            return Err(ChainError::Validation(
                "only the buyer or the seller can raise a dispute".to_string(),
            ));
        }
        if agreement.status.is_terminal() || agreement.status == EscrowStatus::Disputed {
            return Err(wrong_state("raise a dispute", agreement.status));
        }
        agreement.status = EscrowStatus::Disputed;
        warn!(id, actor, "escrow agreement disputed");
        Ok(())
    }

    /// Timeout sweep, invoked before each mining attempt. Every agreement
    /// whose timeout block has passed and that has not completed is refunded:
    /// the buyer is credited `amount + mediator_fee` directly in the balance
    /// map. This is the one documented exception to the rule that balances
    /// change only on block application. Returns the number of refunds.
    pub fn check_timeouts(&mut self, chain: &mut Blockchain) -> usize {
        let height = chain.len() as u64;
        let mut refunded = 0;
        for agreement in &mut self.agreements {
            if agreement.status.is_terminal() || height < agreement.timeout_block {
                continue;
            }
            chain
                .state
                .credit(&agreement.buyer, agreement.amount + agreement.mediator_fee);
            agreement.status = EscrowStatus::Refunded;
            refunded += 1;
            warn!(
                id = %agreement.id,
                buyer = %agreement.buyer,
                "escrow agreement timed out, buyer refunded"
            );
        }
        refunded
    }
}

fn wrong_state(operation: &str, status: EscrowStatus) -> ChainError {
    ChainError::Validation(format!(
        "cannot {} while the agreement is in state {:?}",
        operation, status
    ))
}
