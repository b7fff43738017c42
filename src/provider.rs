//! Wallet provider capability
//!
//! The wallet lives outside this client: it owns the key material, decides
//! whether to authorize a connection, and signs transactions on request. The
//! core holds only a non-owning handle to it. `KeypairWallet` is the local
//! stand-in used by the command-line flow, backed by a keypair file.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::Transaction,
};
use thiserror::Error;
use tokio::sync::mpsc;

/// Events a provider may raise on its own, outside any call made by us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletEvent {
    /// The wallet authorized this client for the given address.
    Connected(Pubkey),
    /// The wallet revoked the session.
    Disconnected,
    /// The wallet switched to a different authorized address.
    AccountChanged(Pubkey),
}

#[derive(Error, Debug)]
pub enum ProviderError {
    /// The user or the wallet refused a connect/disconnect request.
    #[error("connection denied: {0}")]
    Denied(String),

    /// The user or the wallet refused to sign.
    #[error("signing denied: {0}")]
    SigningDenied(String),

    /// The provider failed for reasons other than an explicit refusal.
    #[error("provider failure: {0}")]
    Internal(String),
}

/// The capability surface this client consumes.
///
/// `connect(true)` is the eager, trust-gated form: it must succeed without
/// user interaction when the origin was previously authorized and fail
/// otherwise. `connect(false)` may prompt.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn connect(&self, trusted_only: bool) -> Result<Pubkey, ProviderError>;

    async fn disconnect(&self) -> Result<(), ProviderError>;

    /// Returns a signed copy; the input transaction is not modified.
    async fn sign_transaction(&self, tx: &Transaction) -> Result<Transaction, ProviderError>;

    /// Stream of provider-initiated events. Events caused by our own
    /// connect/disconnect calls are not echoed here.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<WalletEvent>;
}

/// Keypair-file wallet for the command-line flow.
///
/// Trust gating mirrors an extension wallet: the eager connect only succeeds
/// once the origin has been authorized, and an interactive connect succeeds
/// only when `auto_approve` is set.
pub struct KeypairWallet {
    keypair: Arc<Keypair>,
    trusted: AtomicBool,
    auto_approve: bool,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair, trusted: bool, auto_approve: bool) -> Self {
        Self {
            keypair: Arc::new(keypair),
            trusted: AtomicBool::new(trusted),
            auto_approve,
        }
    }

    /// Load a keypair file in either raw-bytes or JSON-array format.
    pub fn from_file(path: &str, trusted: bool, auto_approve: bool) -> anyhow::Result<Self> {
        let raw = std::fs::read(path)
            .with_context(|| format!("failed to read keypair file: {}", path))?;

        let bytes: Vec<u8> = if raw.len() == 64 {
            raw
        } else {
            serde_json::from_slice(&raw).context("failed to parse keypair JSON")?
        };
        if bytes.len() != 64 {
            anyhow::bail!("invalid keypair length: expected 64 bytes, got {}", bytes.len());
        }
        if bytes.iter().all(|&b| b == 0) {
            anyhow::bail!("invalid keypair: all-zero key rejected");
        }
        let keypair = Keypair::try_from(bytes.as_slice()).context("invalid keypair bytes")?;

        Ok(Self::new(keypair, trusted, auto_approve))
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

#[async_trait]
impl WalletProvider for KeypairWallet {
    async fn connect(&self, trusted_only: bool) -> Result<Pubkey, ProviderError> {
        if trusted_only {
            if !self.trusted.load(Ordering::Acquire) {
                return Err(ProviderError::Denied(
                    "origin not previously authorized".to_string(),
                ));
            }
            return Ok(self.keypair.pubkey());
        }
        if !self.auto_approve {
            return Err(ProviderError::Denied("connect request rejected".to_string()));
        }
        self.trusted.store(true, Ordering::Release);
        Ok(self.keypair.pubkey())
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn sign_transaction(&self, tx: &Transaction) -> Result<Transaction, ProviderError> {
        let mut signed = tx.clone();
        let blockhash = signed.message.recent_blockhash;
        signed
            .try_sign(&[self.keypair.as_ref()], blockhash)
            .map_err(|err| ProviderError::Internal(format!("keypair signing failed: {err}")))?;
        Ok(signed)
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<WalletEvent> {
        // A local keypair never raises provider-side events.
        let (_tx, rx) = mpsc::unbounded_channel();
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn eager_connect_requires_prior_trust() {
        let wallet = KeypairWallet::new(Keypair::new(), false, true);
        assert!(matches!(
            wallet.connect(true).await,
            Err(ProviderError::Denied(_))
        ));

        // An interactive connect authorizes the origin for later eager connects.
        let address = wallet.connect(false).await.expect("approved connect");
        assert_eq!(address, wallet.pubkey());
        assert_eq!(wallet.connect(true).await.expect("now trusted"), address);
    }

    #[tokio::test]
    async fn interactive_connect_respects_approval() {
        let wallet = KeypairWallet::new(Keypair::new(), false, false);
        assert!(matches!(
            wallet.connect(false).await,
            Err(ProviderError::Denied(_))
        ));
    }

    #[test]
    fn from_file_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.json");

        std::fs::write(&path, serde_json::to_vec(&vec![0u8; 64]).unwrap()).unwrap();
        assert!(KeypairWallet::from_file(path.to_str().unwrap(), false, true).is_err());

        std::fs::write(&path, b"not json at all").unwrap();
        assert!(KeypairWallet::from_file(path.to_str().unwrap(), false, true).is_err());

        let keypair = Keypair::new();
        std::fs::write(&path, serde_json::to_vec(&keypair.to_bytes().to_vec()).unwrap()).unwrap();
        let wallet = KeypairWallet::from_file(path.to_str().unwrap(), false, true).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
    }
}
