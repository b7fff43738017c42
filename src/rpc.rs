//! Ledger network RPC boundary
//!
//! Everything the client asks of the network goes through the [`LedgerRpc`]
//! trait: balance reads, token account enumeration, blockhash fetches,
//! broadcast and confirmation polling. `HttpLedgerRpc` is the production
//! implementation over the nonblocking Solana RPC client; tests substitute a
//! scripted ledger.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use solana_account_decoder::UiAccount;
use solana_client::{
    client_error::ClientError,
    nonblocking::rpc_client::RpcClient,
    rpc_request::TokenAccountsFilter,
};
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    /// The network call itself failed (transport, rate limit, RPC error).
    #[error("rpc query failed: {0}")]
    Query(String),

    /// The call succeeded but the response payload could not be interpreted.
    #[error("malformed rpc payload: {0}")]
    Payload(String),
}

impl From<ClientError> for RpcError {
    fn from(err: ClientError) -> Self {
        RpcError::Query(err.to_string())
    }
}

/// Terminal-or-not status of a broadcast signature, one poll at a time.
/// Callers own the polling loop and its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    Processing,
    Confirmed,
    /// The transaction landed but the program reported failure.
    Failed(String),
}

#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Native balance in lamports.
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError>;

    /// All token accounts owned by `owner` under the given token program, as
    /// (account address, raw account bytes). Order is whatever the network
    /// returns; callers must not rely on it.
    async fn token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        program: &Pubkey,
    ) -> Result<Vec<(Pubkey, Vec<u8>)>, RpcError>;

    /// Raw data of a single account, `None` if the account does not exist.
    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError>;

    /// A blockhash fresh enough for a new transaction.
    async fn latest_blockhash(&self) -> Result<Hash, RpcError>;

    /// Serialize and broadcast a signed transaction.
    async fn broadcast(&self, tx: &Transaction) -> Result<Signature, RpcError>;

    /// Single status poll for a broadcast signature.
    async fn signature_status(&self, signature: &Signature) -> Result<SignatureStatus, RpcError>;
}

/// HTTP implementation over the cluster's JSON-RPC endpoint.
pub struct HttpLedgerRpc {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl HttpLedgerRpc {
    pub fn new(url: &str, commitment: CommitmentConfig, timeout: Duration) -> Self {
        Self {
            client: RpcClient::new_with_timeout_and_commitment(url.to_string(), timeout, commitment),
            commitment,
        }
    }

    fn decode_keyed_account(pubkey: &str, account: &UiAccount) -> Result<(Pubkey, Vec<u8>), RpcError> {
        let address = Pubkey::from_str(pubkey)
            .map_err(|err| RpcError::Payload(format!("bad account address {pubkey}: {err}")))?;
        let decoded: Account = account
            .decode()
            .ok_or_else(|| RpcError::Payload(format!("undecodable account payload for {pubkey}")))?;
        Ok((address, decoded.data))
    }
}

#[async_trait]
impl LedgerRpc for HttpLedgerRpc {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        Ok(self.client.get_balance(address).await?)
    }

    async fn token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        program: &Pubkey,
    ) -> Result<Vec<(Pubkey, Vec<u8>)>, RpcError> {
        let keyed = self
            .client
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(*program))
            .await?;
        keyed
            .iter()
            .map(|entry| Self::decode_keyed_account(&entry.pubkey, &entry.account))
            .collect()
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError> {
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await?;
        Ok(response.value.map(|account| account.data))
    }

    async fn latest_blockhash(&self) -> Result<Hash, RpcError> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn broadcast(&self, tx: &Transaction) -> Result<Signature, RpcError> {
        Ok(self.client.send_transaction(tx).await?)
    }

    async fn signature_status(&self, signature: &Signature) -> Result<SignatureStatus, RpcError> {
        let status = self
            .client
            .get_signature_status_with_commitment(signature, self.commitment)
            .await?;
        Ok(match status {
            None => SignatureStatus::Processing,
            Some(Ok(())) => SignatureStatus::Confirmed,
            Some(Err(err)) => SignatureStatus::Failed(err.to_string()),
        })
    }
}
