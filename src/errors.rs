//! Error taxonomy for the client
//!
//! Each module carries its own error enum; this type aggregates them for
//! callers that drive the whole pipeline. `category` feeds structured log
//! fields, `is_retryable` says whether a deliberate fresh attempt (new
//! build, new blockhash) could plausibly succeed. Nothing in this crate
//! retries on its own.

use thiserror::Error;

use crate::balances::BalanceError;
use crate::rpc::RpcError;
use crate::session::SessionError;
use crate::store::StoreError;
use crate::tx::builder::BuildError;
use crate::tx::submit::SubmitError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Balance(#[from] BalanceError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl ClientError {
    /// Error category for logging and reporting.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Session(SessionError::Unavailable) => "wallet_unavailable",
            Self::Session(SessionError::Denied(_)) => "connection_denied",
            Self::Session(SessionError::Provider(_)) => "provider",
            Self::Balance(BalanceError::Query(_)) => "query",
            Self::Balance(BalanceError::Decode(_)) => "decode",
            Self::Build(BuildError::Precondition(_)) => "precondition",
            Self::Build(BuildError::Blockhash(_)) => "blockhash",
            Self::Submit(err) => err.category(),
            Self::Store(StoreError::NotFound(_)) => "store_not_found",
            Self::Store(_) => "store",
            Self::Rpc(_) => "rpc",
        }
    }

    /// Whether a deliberate new attempt might succeed. Refusals and
    /// on-chain failures are final; network trouble generally is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Balance(BalanceError::Query(_)) => true,
            Self::Build(BuildError::Blockhash(_)) => true,
            Self::Submit(err) => matches!(
                err,
                SubmitError::Broadcast(_)
                    | SubmitError::ConfirmationTimeout { .. }
                    | SubmitError::Confirmation(_)
            ),
            Self::Rpc(_) => true,

            Self::Session(_) => false,
            Self::Balance(BalanceError::Decode(_)) => false,
            Self::Build(BuildError::Precondition(_)) => false,
            Self::Store(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_distinguish_the_taxonomy() {
        let err: ClientError = SessionError::Unavailable.into();
        assert_eq!(err.category(), "wallet_unavailable");

        let err: ClientError = BuildError::Precondition("no session".to_string()).into();
        assert_eq!(err.category(), "precondition");

        let err: ClientError = SubmitError::SigningDenied("refused".to_string()).into();
        assert_eq!(err.category(), "signing_denied");

        let err: ClientError = StoreError::NotFound("missing".to_string()).into();
        assert_eq!(err.category(), "store_not_found");
    }

    #[test]
    fn refusals_are_not_retryable() {
        let denied: ClientError = SessionError::Denied("no".to_string()).into();
        assert!(!denied.is_retryable());

        let timeout: ClientError = SubmitError::ConfirmationTimeout {
            signature: solana_sdk::signature::Signature::default(),
            elapsed: std::time::Duration::from_secs(30),
        }
        .into();
        assert!(timeout.is_retryable());

        let stale: ClientError =
            BuildError::Blockhash(RpcError::Query("behind".to_string())).into();
        assert!(stale.is_retryable());
    }

    #[test]
    fn display_is_transparent() {
        let err: ClientError = SessionError::Unavailable.into();
        assert_eq!(err.to_string(), "no wallet capability detected");
    }
}
