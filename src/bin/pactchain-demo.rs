//! Local end-to-end demo: issue wallets, run an escrow purchase, mine blocks.

use clap::Parser;
use pactchain::config::load_config;
use pactchain::crypto::KeyPair;
use pactchain::node::Node;
use pactchain::transaction::Transaction;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "pactchain-demo",
    about = "Run a local ledger demo with an escrow purchase"
)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "pactchain.toml")]
    config: String,

    /// Extra empty blocks to mine at the end
    #[arg(long, default_value_t = 2)]
    blocks: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = load_config(&args.config)?;
    let node = Node::new(config)?;

    let buyer = node.issue_wallet()?;
    let seller = node.issue_wallet()?;
    let miner = node.issue_wallet()?;
    info!(buyer = %buyer.address, seller = %seller.address, "issued demo wallets");

    // A plain signed transfer, mined into the next block
    let buyer_key = KeyPair::from_secret_hex(&buyer.secret_key)?;
    let mut tx = Transaction::normal(&buyer.address, &seller.address, 1.0, 0.1);
    tx.sign(&buyer_key)?;
    node.submit_transaction(tx)?;
    node.mine(&miner.address)?;

    // A full escrow purchase: deposit, confirmations, payout
    let id = node.create_escrow(
        &buyer.address,
        &seller.address,
        5.0,
        "demo purchase",
        &buyer.secret_key,
    )?;
    node.mine(&miner.address)?;
    node.confirm_seller_participation(&id, &seller.address)?;
    node.confirm_shipment(&id, &seller.address, Some("PKG-001".to_string()))?;
    node.confirm_delivery(&id, &buyer.address)?;
    node.mine(&miner.address)?;

    for _ in 0..args.blocks {
        node.mine(&miner.address)?;
    }

    info!(
        valid = node.validate(),
        length = node.chain_snapshot().length,
        "chain state"
    );
    info!(
        buyer = node.balance(&buyer.address),
        seller = node.balance(&seller.address),
        miner = node.balance(&miner.address),
        mediator = node.balance("mediator"),
        "final balances"
    );
    if let Some(agreement) = node.agreement(&id) {
        info!(status = ?agreement.status, "escrow agreement settled");
    }

    Ok(())
}
