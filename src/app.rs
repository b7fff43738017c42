//! Application glue: observable balances and action enablement
//!
//! [`BalanceFeed`] runs the read path on behalf of a session. Refreshes are
//! tagged with the session epoch they were issued under; a result that
//! arrives after the session has moved to another address (or to none) is
//! discarded instead of being displayed under the new identity. That
//! staleness check at apply time is the correctness mechanism; in-flight
//! queries are never hard-cancelled.

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::balances::{Balance, BalanceError, BalanceResolver};
use crate::rpc::LedgerRpc;
use crate::session::SessionSnapshot;

/// Resolved balances for the session's current identity. Both values start
/// absent, fill in as queries complete, and reset whenever the identity
/// changes or the session disconnects.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceView {
    epoch: u64,
    native: Option<Balance>,
    token: Option<Balance>,
}

impl BalanceView {
    /// Advance to a newer session epoch, clearing stale values. Older
    /// epochs never move the view backwards.
    pub fn sync(&mut self, snapshot: &SessionSnapshot) {
        if snapshot.epoch > self.epoch {
            self.epoch = snapshot.epoch;
            self.native = None;
            self.token = None;
        }
    }

    /// Apply a native-balance result issued under `epoch`. Returns false
    /// and changes nothing when the result is stale.
    pub fn apply_native(&mut self, epoch: u64, balance: Balance) -> bool {
        if epoch != self.epoch {
            debug!(issued = epoch, current = self.epoch, "discarding stale native balance");
            return false;
        }
        self.native = Some(balance);
        true
    }

    pub fn apply_token(&mut self, epoch: u64, balance: Option<Balance>) -> bool {
        if epoch != self.epoch {
            debug!(issued = epoch, current = self.epoch, "discarding stale token balance");
            return false;
        }
        self.token = balance;
        true
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn native(&self) -> Option<Balance> {
        self.native
    }

    pub fn token(&self) -> Option<Balance> {
        self.token
    }
}

/// Which user actions are currently enabled, straight from session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actions {
    pub connect_enabled: bool,
    pub disconnect_enabled: bool,
    pub greet_enabled: bool,
}

impl Actions {
    pub fn for_session(snapshot: &SessionSnapshot) -> Self {
        Self {
            connect_enabled: snapshot.available && !snapshot.connected,
            disconnect_enabled: snapshot.available && snapshot.connected,
            greet_enabled: snapshot.connected,
        }
    }
}

/// Balance refresh pipeline for one optional token mint.
#[derive(Clone)]
pub struct BalanceFeed {
    resolver: BalanceResolver,
    view: Arc<RwLock<BalanceView>>,
    token_mint: Option<Pubkey>,
}

impl BalanceFeed {
    pub fn new(rpc: Arc<dyn LedgerRpc>, token_mint: Option<Pubkey>) -> Self {
        Self {
            resolver: BalanceResolver::new(rpc),
            view: Arc::new(RwLock::new(BalanceView::default())),
            token_mint,
        }
    }

    pub async fn view(&self) -> BalanceView {
        *self.view.read().await
    }

    /// Fire-and-forget refresh, for use inside session event handlers.
    pub fn spawn_refresh(&self, snapshot: SessionSnapshot) {
        let feed = self.clone();
        tokio::spawn(async move {
            if let Err(err) = feed.refresh(&snapshot).await {
                warn!(error = %err, "balance refresh failed");
            }
        });
    }

    /// Resolve balances for the snapshot's address and apply them under its
    /// epoch. A disconnected snapshot only clears the view.
    pub async fn refresh(&self, snapshot: &SessionSnapshot) -> Result<(), BalanceError> {
        self.view.write().await.sync(snapshot);
        let Some(address) = snapshot.address else {
            return Ok(());
        };

        let native = self.resolver.native_balance(&address).await?;
        if !self.view.write().await.apply_native(snapshot.epoch, native) {
            // The session moved on while we were querying; the token query
            // for this identity is pointless now.
            return Ok(());
        }

        if let Some(mint) = self.token_mint {
            let scan = self.resolver.token_balance(&address, &mint).await?;
            if scan.skipped > 0 {
                warn!(skipped = scan.skipped, owner = %address, "token scan skipped undecodable accounts");
            }
            self.view.write().await.apply_token(snapshot.epoch, scan.balance);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{encode_token_account, ScriptedLedger};

    fn snapshot(address: Option<Pubkey>, epoch: u64) -> SessionSnapshot {
        SessionSnapshot {
            available: true,
            connected: address.is_some(),
            address,
            epoch,
        }
    }

    #[test]
    fn actions_follow_session_preconditions() {
        let none = SessionSnapshot { available: false, connected: false, address: None, epoch: 0 };
        assert_eq!(
            Actions::for_session(&none),
            Actions { connect_enabled: false, disconnect_enabled: false, greet_enabled: false }
        );

        let idle = snapshot(None, 1);
        assert_eq!(
            Actions::for_session(&idle),
            Actions { connect_enabled: true, disconnect_enabled: false, greet_enabled: false }
        );

        let connected = snapshot(Some(Pubkey::new_unique()), 2);
        assert_eq!(
            Actions::for_session(&connected),
            Actions { connect_enabled: false, disconnect_enabled: true, greet_enabled: true }
        );
    }

    #[tokio::test]
    async fn refresh_fills_the_view() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ledger = Arc::new(ScriptedLedger::new());
        ledger.set_balance(owner, 1_000);
        ledger.add_token_account(owner, Pubkey::new_unique(), encode_token_account(&mint, &owner, 42));

        let feed = BalanceFeed::new(ledger, Some(mint));
        feed.refresh(&snapshot(Some(owner), 1)).await.unwrap();

        let view = feed.view().await;
        assert_eq!(view.native().map(|b| b.amount), Some(1_000));
        assert_eq!(view.token().map(|b| b.amount), Some(42));
    }

    #[tokio::test]
    async fn late_result_for_a_previous_identity_is_discarded() {
        let old_owner = Pubkey::new_unique();
        let new_owner = Pubkey::new_unique();
        let ledger = Arc::new(ScriptedLedger::new());
        ledger.set_balance(old_owner, 5);
        ledger.set_balance(new_owner, 7);

        let feed = BalanceFeed::new(ledger, None);
        // The session has already moved to the new identity ...
        feed.refresh(&snapshot(Some(new_owner), 2)).await.unwrap();
        // ... when a refresh issued under the old identity completes.
        feed.refresh(&snapshot(Some(old_owner), 1)).await.unwrap();

        let view = feed.view().await;
        assert_eq!(view.native().map(|b| b.amount), Some(7));
        assert_eq!(view.epoch(), 2);
    }

    #[tokio::test]
    async fn disconnect_resets_balances_to_absent() {
        let owner = Pubkey::new_unique();
        let ledger = Arc::new(ScriptedLedger::new());
        ledger.set_balance(owner, 5);

        let feed = BalanceFeed::new(ledger, None);
        feed.refresh(&snapshot(Some(owner), 1)).await.unwrap();
        assert!(feed.view().await.native().is_some());

        feed.refresh(&snapshot(None, 2)).await.unwrap();
        let view = feed.view().await;
        assert_eq!(view.native(), None);
        assert_eq!(view.token(), None);
    }

    #[test]
    fn apply_checks_the_issuing_epoch() {
        let mut view = BalanceView::default();
        view.sync(&snapshot(Some(Pubkey::new_unique()), 3));

        assert!(!view.apply_native(2, Balance::native(1)));
        assert_eq!(view.native(), None);

        assert!(view.apply_native(3, Balance::native(1)));
        assert_eq!(view.native().map(|b| b.amount), Some(1));
    }
}
