//! Balance resolution for a public address
//!
//! Pure read path: every call is a fresh round trip, nothing is cached, and
//! results never mutate session state. Query failures surface as errors so
//! the caller can tell "zero" from "could not ask".

use std::sync::Arc;

use solana_sdk::{program_pack::Pack, pubkey::Pubkey};
use spl_token::state::Account as TokenAccount;
use thiserror::Error;
use tracing::debug;

use crate::rpc::{LedgerRpc, RpcError};

/// Scale of the native unit (lamports per SOL, 10^9).
pub const NATIVE_DECIMALS: u8 = 9;

/// An amount in minor units together with its display scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    pub amount: u64,
    pub decimals: u8,
}

impl Balance {
    pub fn native(lamports: u64) -> Self {
        Self { amount: lamports, decimals: NATIVE_DECIMALS }
    }

    /// Display value in major units.
    pub fn ui(&self) -> f64 {
        self.amount as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// Outcome of a token-account scan. `balance` is absent when no account for
/// the requested mint exists; `skipped` counts entries whose payload could
/// not be decoded and were ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenScan {
    pub balance: Option<Balance>,
    pub skipped: usize,
}

#[derive(Error, Debug)]
pub enum BalanceError {
    #[error("balance query failed: {0}")]
    Query(#[from] RpcError),

    #[error("malformed account data: {0}")]
    Decode(String),
}

#[derive(Clone)]
pub struct BalanceResolver {
    rpc: Arc<dyn LedgerRpc>,
}

impl BalanceResolver {
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self { rpc }
    }

    pub async fn native_balance(&self, address: &Pubkey) -> Result<Balance, BalanceError> {
        let lamports = self.rpc.get_balance(address).await?;
        Ok(Balance::native(lamports))
    }

    /// Scan the address's token accounts for one holding the given mint.
    ///
    /// The scan matches by decoded mint equality and makes no assumption
    /// about the order accounts come back in. An entry that fails to decode
    /// is skipped and counted rather than aborting the scan; the response
    /// shape is the network's to get wrong, not ours.
    pub async fn token_balance(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<TokenScan, BalanceError> {
        let accounts = self.rpc.token_accounts_by_owner(owner, &spl_token::id()).await?;
        let mut balance = None;
        let mut skipped = 0;
        for (address, data) in accounts {
            match TokenAccount::unpack(&data) {
                Ok(account) => {
                    if account.mint == *mint {
                        // Token accounts carry no scale of their own; amounts
                        // display against the native scale.
                        balance = Some(Balance { amount: account.amount, decimals: NATIVE_DECIMALS });
                    }
                }
                Err(err) => {
                    skipped += 1;
                    debug!(account = %address, error = %err, "skipping undecodable token account");
                }
            }
        }
        Ok(TokenScan { balance, skipped })
    }

    /// How many times the account has been greeted, per the greeting
    /// program's public account layout (little-endian u32 counter prefix).
    /// `None` when the account does not exist yet.
    pub async fn greeting_count(&self, address: &Pubkey) -> Result<Option<u32>, BalanceError> {
        let Some(data) = self.rpc.account_data(address).await? else {
            return Ok(None);
        };
        if data.len() < 4 {
            return Err(BalanceError::Decode(format!(
                "greeting account holds {} bytes, expected at least 4",
                data.len()
            )));
        }
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&data[..4]);
        Ok(Some(u32::from_le_bytes(raw)))
    }
}
