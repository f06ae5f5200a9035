//! Integration tests for escrow settlement through the node facade: deposit,
//! confirmations, payout mining and the timeout refund path.

use pactchain::config::Config;
use pactchain::crypto::KeyPair;
use pactchain::escrow::{EscrowStatus, ESCROW_CONTRACT_ADDRESS, MEDIATOR_ADDRESS};
use pactchain::node::Node;
use pactchain::transaction::{Transaction, TxKind};

#[test]
fn test_escrow_round_trip_settles_all_parties() -> Result<(), Box<dyn std::error::Error>> {
    let node = Node::new(Config::default())?;
    let buyer = node.issue_wallet()?;
    let seller = node.issue_wallet()?;

    // amount 5.0 => mediator fee 0.1, initial mining fee 0.05, two release
    // fees of 0.1 reserved for the payout transfers.
    let id = node.create_escrow(
        &buyer.address,
        &seller.address,
        5.0,
        "vintage synth",
        &buyer.secret_key,
    )?;
    node.mine("miner")?;

    // Deposit settled: buyer paid amount + mediator fee + release fees + the
    // deposit's own mining fee; the contract holds everything but that fee.
    assert!((node.balance(&buyer.address) - 4.65).abs() < 1e-9);
    assert!((node.balance(ESCROW_CONTRACT_ADDRESS) - 5.3).abs() < 1e-9);

    node.confirm_seller_participation(&id, &seller.address)?;
    node.confirm_shipment(&id, &seller.address, Some("PKG-42".to_string()))?;
    node.confirm_delivery(&id, &buyer.address)?;
    assert_eq!(node.agreement(&id).unwrap().status, EscrowStatus::Completed);

    // Payouts are queued, not yet applied
    assert_eq!(node.balance(&seller.address), 10.0);

    let block = node.mine("miner")?;
    assert!(block
        .transactions
        .iter()
        .any(|tx| tx.kind == TxKind::ContractTransfer));

    assert_eq!(node.balance(&seller.address), 15.0);
    assert!((node.balance(MEDIATOR_ADDRESS) - 0.1).abs() < 1e-9);
    assert!(node.balance(ESCROW_CONTRACT_ADDRESS).abs() < 1e-9);
    assert!(node.validate());
    Ok(())
}

#[test]
fn test_deposit_and_payouts_settle_in_one_block() -> Result<(), Box<dyn std::error::Error>> {
    let node = Node::new(Config::default())?;
    let buyer = node.issue_wallet()?;
    let seller = node.issue_wallet()?;

    let id = node.create_escrow(&buyer.address, &seller.address, 5.0, "book", &buyer.secret_key)?;
    node.confirm_seller_participation(&id, &seller.address)?;
    node.confirm_shipment(&id, &seller.address, None)?;
    node.confirm_delivery(&id, &buyer.address)?;

    // Deposit plus both payout transfers fit the default block, and the
    // deposit funds the contract before the transfers draw it down.
    let block = node.mine("miner")?;
    assert_eq!(block.transactions.len(), 4);
    assert_eq!(block.transactions[0].kind, TxKind::Coinbase);

    assert!((node.balance(&buyer.address) - 4.65).abs() < 1e-9);
    assert_eq!(node.balance(&seller.address), 15.0);
    assert!((node.balance(MEDIATOR_ADDRESS) - 0.1).abs() < 1e-9);
    assert!(node.balance(ESCROW_CONTRACT_ADDRESS).abs() < 1e-9);
    assert!(node.validate());
    Ok(())
}

#[test]
fn test_high_fee_traffic_does_not_stall_settlement() -> Result<(), Box<dyn std::error::Error>> {
    let node = Node::new(Config::default())?;
    let buyer = node.issue_wallet()?;
    let seller = node.issue_wallet()?;
    let carol = node.issue_wallet()?;

    // Payouts carry a higher fee than the deposit that funds them, and a
    // third transaction outranks everything. Mining must still make
    // progress: the deposit is taken before any payout it funds.
    let id = node.create_escrow(&buyer.address, &seller.address, 5.0, "lamp", &buyer.secret_key)?;
    node.confirm_seller_participation(&id, &seller.address)?;
    node.confirm_shipment(&id, &seller.address, None)?;
    node.confirm_delivery(&id, &buyer.address)?;

    let carol_key = KeyPair::from_secret_hex(&carol.secret_key)?;
    let mut tx = Transaction::normal(&carol.address, "dave", 1.0, 0.5);
    tx.sign(&carol_key)?;
    node.submit_transaction(tx)?;

    node.mine("miner")?;
    node.mine("miner")?;

    assert!(node.mempool_snapshot().pending.is_empty());
    assert_eq!(node.balance(&seller.address), 15.0);
    assert!((node.balance(MEDIATOR_ADDRESS) - 0.1).abs() < 1e-9);
    assert!(node.balance(ESCROW_CONTRACT_ADDRESS).abs() < 1e-9);
    assert_eq!(node.balance("dave"), 1.0);
    assert!(node.validate());
    Ok(())
}

#[test]
fn test_stalled_agreement_refunds_on_mine() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::default();
    config.escrow.timeout_blocks = 1;
    let node = Node::new(config)?;
    let buyer = node.issue_wallet()?;
    let seller = node.issue_wallet()?;

    let id = node.create_escrow(&buyer.address, &seller.address, 5.0, "ghosted", &buyer.secret_key)?;
    node.raise_dispute(&id, &buyer.address)?;

    // First mine settles the deposit; the timeout block has not passed yet.
    node.mine("miner")?;
    assert_eq!(node.agreement(&id).unwrap().status, EscrowStatus::Disputed);
    assert!((node.balance(&buyer.address) - 4.65).abs() < 1e-9);

    // The sweep before the next mine refunds the buyer directly.
    node.mine("miner")?;
    assert_eq!(node.agreement(&id).unwrap().status, EscrowStatus::Refunded);
    assert!((node.balance(&buyer.address) - 9.75).abs() < 1e-9);
    assert!(node.validate());
    Ok(())
}
