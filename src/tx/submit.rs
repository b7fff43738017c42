//! Signing, broadcast and confirmation
//!
//! `Built -> Signed -> Submitted -> Confirmed`, with failure as an absorbing
//! state reachable from every step. Once broadcast, the side effect is on
//! the network and cannot be recalled; before broadcast, dropping the
//! transaction is a free cancel.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::{signature::Signature, transaction::Transaction};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::provider::{ProviderError, WalletProvider};
use crate::rpc::{LedgerRpc, RpcError, SignatureStatus};

/// The furthest pipeline stage a submission reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStage {
    Built,
    Signed,
    Submitted,
    Confirmed,
}

#[derive(Error, Debug)]
pub enum SubmitError {
    /// The user or the wallet refused to sign. Nothing was broadcast.
    #[error("signing denied: {0}")]
    SigningDenied(String),

    /// Signing failed for reasons other than an explicit refusal.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The network rejected the broadcast. Not retried here; a resend
    /// needs a freshly built transaction.
    #[error("broadcast rejected: {0}")]
    Broadcast(String),

    /// No terminal status arrived within the caller's deadline. The
    /// transaction may still land.
    #[error("confirmation timed out after {elapsed:?} for {signature}")]
    ConfirmationTimeout {
        signature: Signature,
        elapsed: Duration,
    },

    /// The transaction was included but the program reported failure.
    #[error("transaction {signature} failed on chain: {detail}")]
    Execution {
        signature: Signature,
        detail: String,
    },

    /// A status poll itself failed; the transaction's fate is unknown.
    #[error("confirmation query failed: {0}")]
    Confirmation(#[from] RpcError),
}

impl SubmitError {
    /// Stage the pipeline had reached when this failure occurred.
    pub fn stage(&self) -> SubmitStage {
        match self {
            Self::SigningDenied(_) | Self::Signing(_) => SubmitStage::Built,
            Self::Broadcast(_) => SubmitStage::Signed,
            Self::ConfirmationTimeout { .. } | Self::Execution { .. } | Self::Confirmation(_) => {
                SubmitStage::Submitted
            }
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::SigningDenied(_) => "signing_denied",
            Self::Signing(_) => "signing",
            Self::Broadcast(_) => "broadcast",
            Self::ConfirmationTimeout { .. } => "confirmation_timeout",
            Self::Execution { .. } => "execution",
            Self::Confirmation(_) => "confirmation",
        }
    }
}

/// Confirmation-wait bounds. The network is not assumed to answer promptly;
/// whoever calls `submit` decides how long to wait and how often to poll.
#[derive(Debug, Clone, Copy)]
pub struct SubmitOptions {
    pub confirm_deadline: Duration,
    pub poll_interval: Duration,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            confirm_deadline: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// A confirmed submission: the signature the network accepted and finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub signature: Signature,
}

pub struct TransactionSubmitter {
    rpc: Arc<dyn LedgerRpc>,
    options: SubmitOptions,
}

impl TransactionSubmitter {
    pub fn new(rpc: Arc<dyn LedgerRpc>, options: SubmitOptions) -> Self {
        Self { rpc, options }
    }

    /// Drive a built transaction through sign, broadcast and confirmation.
    ///
    /// A signing refusal never reaches the network. After a successful
    /// broadcast the attempt is irrevocable; every failure from then on
    /// reports the signature so the caller can keep watching it.
    pub async fn submit(
        &self,
        tx: Transaction,
        provider: &dyn WalletProvider,
    ) -> Result<Confirmation, SubmitError> {
        let signed = provider.sign_transaction(&tx).await.map_err(|err| match err {
            ProviderError::SigningDenied(reason) | ProviderError::Denied(reason) => {
                SubmitError::SigningDenied(reason)
            }
            ProviderError::Internal(reason) => SubmitError::Signing(reason),
        })?;
        debug!("transaction signed");

        let signature = self
            .rpc
            .broadcast(&signed)
            .await
            .map_err(|err| SubmitError::Broadcast(err.to_string()))?;
        info!(signature = %signature, "transaction submitted, awaiting confirmation");

        let started = Instant::now();
        loop {
            match self.rpc.signature_status(&signature).await? {
                SignatureStatus::Confirmed => {
                    info!(signature = %signature, "transaction confirmed");
                    return Ok(Confirmation { signature });
                }
                SignatureStatus::Failed(detail) => {
                    warn!(signature = %signature, detail = %detail, "transaction failed on chain");
                    return Err(SubmitError::Execution { signature, detail });
                }
                SignatureStatus::Processing => {}
            }
            let elapsed = started.elapsed();
            if elapsed >= self.options.confirm_deadline {
                return Err(SubmitError::ConfirmationTimeout { signature, elapsed });
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{ScriptedLedger, ScriptedWallet};
    use crate::tx::builder::{TransactionBuilder, GREETING_PROGRAM_ID};

    fn fast_options() -> SubmitOptions {
        SubmitOptions {
            confirm_deadline: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
        }
    }

    async fn greeting_for(wallet: &ScriptedWallet, ledger: &Arc<ScriptedLedger>) -> Transaction {
        TransactionBuilder::new(ledger.clone())
            .build_greeting(Some(wallet.pubkey()), &GREETING_PROGRAM_ID)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn signing_refusal_never_reaches_the_network() {
        let wallet = ScriptedWallet::sign_denying();
        let ledger = Arc::new(ScriptedLedger::new());
        let tx = greeting_for(&wallet, &ledger).await;

        let err = TransactionSubmitter::new(ledger.clone(), fast_options())
            .submit(tx, &wallet)
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::SigningDenied(_)));
        assert_eq!(err.stage(), SubmitStage::Built);
        assert_eq!(ledger.broadcast_count(), 0);
    }

    #[tokio::test]
    async fn broadcast_rejection_is_terminal() {
        let wallet = ScriptedWallet::trusted();
        let ledger = Arc::new(ScriptedLedger::new());
        let tx = greeting_for(&wallet, &ledger).await;
        ledger.fail_broadcasts("blockhash not found");

        let err = TransactionSubmitter::new(ledger.clone(), fast_options())
            .submit(tx, &wallet)
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::Broadcast(_)));
        assert_eq!(err.stage(), SubmitStage::Signed);
    }

    #[tokio::test]
    async fn on_chain_failure_is_not_a_confirmation() {
        let wallet = ScriptedWallet::trusted();
        let ledger = Arc::new(ScriptedLedger::new());
        let tx = greeting_for(&wallet, &ledger).await;
        ledger.script_status(SignatureStatus::Processing);
        ledger.script_status(SignatureStatus::Failed("custom program error".to_string()));

        let err = TransactionSubmitter::new(ledger.clone(), fast_options())
            .submit(tx, &wallet)
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::Execution { .. }));
        assert_eq!(err.stage(), SubmitStage::Submitted);
        assert_eq!(ledger.broadcast_count(), 1);
    }

    #[tokio::test]
    async fn polls_until_confirmed() {
        let wallet = ScriptedWallet::trusted();
        let ledger = Arc::new(ScriptedLedger::new());
        let tx = greeting_for(&wallet, &ledger).await;
        ledger.script_status(SignatureStatus::Processing);
        ledger.script_status(SignatureStatus::Processing);
        ledger.script_status(SignatureStatus::Confirmed);

        let confirmation = TransactionSubmitter::new(ledger.clone(), fast_options())
            .submit(tx, &wallet)
            .await
            .unwrap();

        let broadcast = &ledger.broadcasts()[0];
        assert_eq!(confirmation.signature, broadcast.signatures[0]);
    }

    #[tokio::test]
    async fn deadline_elapse_times_out() {
        let wallet = ScriptedWallet::trusted();
        let ledger = Arc::new(ScriptedLedger::new());
        let tx = greeting_for(&wallet, &ledger).await;
        ledger.script_status(SignatureStatus::Processing);

        let options = SubmitOptions {
            confirm_deadline: Duration::ZERO,
            poll_interval: Duration::from_millis(1),
        };
        let err = TransactionSubmitter::new(ledger.clone(), options)
            .submit(tx, &wallet)
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::ConfirmationTimeout { .. }));
        assert_eq!(err.stage(), SubmitStage::Submitted);
    }
}
