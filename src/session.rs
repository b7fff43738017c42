//! Wallet session state machine
//!
//! Tracks the injected wallet capability and the currently authorized
//! address. State changes happen in exactly two ways: provider events fed
//! through [`WalletSession::handle_event`], and explicit user actions
//! (`connect` / `disconnect`). Handlers registered on the session run in
//! registration order, one event at a time; there is no re-entrant dispatch.
//!
//! Every address-affecting transition bumps an epoch counter. Asynchronous
//! side effects (balance queries) capture the epoch they were issued under
//! and are discarded on mismatch when their results arrive, so a result for
//! a previous identity can never surface under the current one.

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;
use tracing::{debug, warn};

use crate::provider::{ProviderError, WalletEvent, WalletProvider};

#[derive(Error, Debug)]
pub enum SessionError {
    /// No wallet capability was detected in the host environment.
    #[error("no wallet capability detected")]
    Unavailable,

    /// The user or the wallet refused the request. Session state is
    /// unchanged from before the call.
    #[error("connection denied: {0}")]
    Denied(String),

    #[error("wallet provider failure: {0}")]
    Provider(String),
}

impl From<ProviderError> for SessionError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Denied(reason) | ProviderError::SigningDenied(reason) => {
                SessionError::Denied(reason)
            }
            ProviderError::Internal(reason) => SessionError::Provider(reason),
        }
    }
}

/// Point-in-time view of the session, safe to hand to asynchronous work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub available: bool,
    pub connected: bool,
    pub address: Option<Pubkey>,
    pub epoch: u64,
}

pub type ConnectHandler = Box<dyn FnMut(&SessionSnapshot) + Send>;
pub type DisconnectHandler = Box<dyn FnMut(&SessionSnapshot) + Send>;

/// Invariants: `connected` implies `address.is_some()`; no provider implies
/// not connected. At most one address is tracked; a connect event replaces
/// any prior address outright.
pub struct WalletSession {
    provider: Option<Arc<dyn WalletProvider>>,
    connected: bool,
    address: Option<Pubkey>,
    epoch: u64,
    connect_handlers: Vec<ConnectHandler>,
    disconnect_handlers: Vec<DisconnectHandler>,
}

impl WalletSession {
    pub fn new() -> Self {
        Self {
            provider: None,
            connected: false,
            address: None,
            epoch: 0,
            connect_handlers: Vec::new(),
            disconnect_handlers: Vec::new(),
        }
    }

    /// Capture the wallet capability if the host environment offers one and
    /// attempt an eager, trust-gated connect. The eager connect succeeds
    /// silently for a previously authorized origin and no-ops otherwise;
    /// its refusal is not an error. Returns availability.
    pub async fn detect(&mut self, provider: Option<Arc<dyn WalletProvider>>) -> bool {
        let Some(provider) = provider else {
            debug!("no wallet capability in host environment");
            self.provider = None;
            return false;
        };
        self.provider = Some(provider.clone());
        match provider.connect(true).await {
            Ok(address) => self.handle_event(WalletEvent::Connected(address)),
            Err(err) => debug!(error = %err, "eager connect declined"),
        }
        true
    }

    pub fn available(&self) -> bool {
        self.provider.is_some()
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn address(&self) -> Option<Pubkey> {
        self.address
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn provider(&self) -> Option<Arc<dyn WalletProvider>> {
        self.provider.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            available: self.available(),
            connected: self.connected,
            address: self.address,
            epoch: self.epoch,
        }
    }

    /// Handlers run in registration order whenever a connect event (or an
    /// account change, which carries a new identity) is applied.
    pub fn on_connect<F>(&mut self, handler: F)
    where
        F: FnMut(&SessionSnapshot) + Send + 'static,
    {
        self.connect_handlers.push(Box::new(handler));
    }

    pub fn on_disconnect<F>(&mut self, handler: F)
    where
        F: FnMut(&SessionSnapshot) + Send + 'static,
    {
        self.disconnect_handlers.push(Box::new(handler));
    }

    /// User-initiated connect. On refusal the session is left exactly as it
    /// was; the refusal propagates to the caller.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        let provider = self.provider.clone().ok_or(SessionError::Unavailable)?;
        let address = provider.connect(false).await?;
        self.handle_event(WalletEvent::Connected(address));
        Ok(())
    }

    /// User-initiated disconnect; same failure contract as [`connect`].
    ///
    /// [`connect`]: WalletSession::connect
    pub async fn disconnect(&mut self) -> Result<(), SessionError> {
        let provider = self.provider.clone().ok_or(SessionError::Unavailable)?;
        provider.disconnect().await?;
        self.handle_event(WalletEvent::Disconnected);
        Ok(())
    }

    /// Single dispatch point for all session transitions. Events are applied
    /// in the order delivered, never reordered or deduplicated.
    pub fn handle_event(&mut self, event: WalletEvent) {
        if self.provider.is_none() {
            warn!(?event, "wallet event without a provider attached, ignoring");
            return;
        }
        match event {
            WalletEvent::Connected(address) => {
                self.connected = true;
                self.address = Some(address);
                self.epoch += 1;
                debug!(address = %address, epoch = self.epoch, "wallet connected");
                let snapshot = self.snapshot();
                for handler in &mut self.connect_handlers {
                    handler(&snapshot);
                }
            }
            WalletEvent::AccountChanged(address) => {
                if !self.connected {
                    debug!(address = %address, "account change while disconnected, ignoring");
                    return;
                }
                self.address = Some(address);
                self.epoch += 1;
                debug!(address = %address, epoch = self.epoch, "authorized account changed");
                let snapshot = self.snapshot();
                for handler in &mut self.connect_handlers {
                    handler(&snapshot);
                }
            }
            WalletEvent::Disconnected => {
                let was_connected = self.connected;
                self.connected = false;
                self.address = None;
                self.epoch += 1;
                debug!(was_connected, epoch = self.epoch, "wallet disconnected");
                let snapshot = self.snapshot();
                for handler in &mut self.disconnect_handlers {
                    handler(&snapshot);
                }
            }
        }
    }
}

impl Default for WalletSession {
    fn default() -> Self {
        Self::new()
    }
}
