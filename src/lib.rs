//! Thin client for the on-chain greeting program.
//!
//! This library exposes the wallet-session and transaction-submission
//! pipeline: session tracking for an injected wallet capability, balance
//! resolution for the authorized address, and the build/sign/submit/confirm
//! path for the single "greet this account" instruction.

pub mod app;
pub mod balances;
pub mod config;
pub mod errors;
pub mod provider;
pub mod rpc;
pub mod session;
pub mod store;
pub mod testkit;
pub mod tx;

pub use errors::ClientError;

// Re-export commonly used types
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
