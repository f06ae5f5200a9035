//! Pactchain - an in-process proof-of-work ledger with an escrow settlement contract
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Chain manager, block verification and balance state
//! - [`transaction`] - Transaction types and validation
//! - [`mempool`] - Pending-transaction pool with fee ordering
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work block sealing
//! - [`hashing`] - Canonical record hashing and Merkle roots
//!
//! ## Cryptography
//! - [`crypto`] - Signatures, verification and address derivation (secp256k1)
//! - [`keyring`] - Registered address -> public key mapping
//!
//! ## Contracts
//! - [`escrow`] - Buyer/seller escrow agreement state machine
//!
//! ## Orchestration & Utilities
//! - [`node`] - Single-writer ledger facade
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod hashing;
pub mod miner;

// ============================================================================
// Cryptography & Keys
// ============================================================================
pub mod crypto;
pub mod keyring;

// ============================================================================
// Contracts
// ============================================================================
pub mod escrow;

// ============================================================================
// Orchestration & Utilities
// ============================================================================
pub mod config;
pub mod error;
pub mod node;
