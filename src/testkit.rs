//! Deterministic test doubles for the wallet and the ledger
//!
//! Scripted stand-ins for the two external collaborators: they record what
//! would have gone out (broadcasts), return programmable results (balances,
//! token accounts, signature statuses), and never touch the network. Tests
//! drive failure paths by flipping the `fail_*` switches or scripting
//! status sequences.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};
use tokio::sync::mpsc;

use crate::provider::{ProviderError, WalletEvent, WalletProvider};
use crate::rpc::{LedgerRpc, RpcError, SignatureStatus};

/// Wallet double with a programmable approval policy.
pub struct ScriptedWallet {
    keypair: Keypair,
    trusted: AtomicBool,
    approve_connect: bool,
    approve_sign: bool,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<WalletEvent>>>,
    connect_calls: AtomicUsize,
    sign_calls: AtomicUsize,
}

impl ScriptedWallet {
    fn with_policy(trusted: bool, approve_connect: bool, approve_sign: bool) -> Self {
        Self {
            keypair: Keypair::new(),
            trusted: AtomicBool::new(trusted),
            approve_connect,
            approve_sign,
            subscribers: Mutex::new(Vec::new()),
            connect_calls: AtomicUsize::new(0),
            sign_calls: AtomicUsize::new(0),
        }
    }

    /// Previously authorized: the eager connect succeeds silently.
    pub fn trusted() -> Self {
        Self::with_policy(true, true, true)
    }

    /// Not yet authorized, but approves interactive requests.
    pub fn untrusted() -> Self {
        Self::with_policy(false, true, true)
    }

    /// Refuses every connect request.
    pub fn denying() -> Self {
        Self::with_policy(false, false, true)
    }

    /// Connects fine but refuses to sign.
    pub fn sign_denying() -> Self {
        Self::with_policy(true, true, false)
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::Relaxed)
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::Relaxed)
    }

    /// Raise a provider-initiated event to every subscriber.
    pub fn emit(&self, event: WalletEvent) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|sender| sender.send(event).is_ok());
    }
}

#[async_trait]
impl WalletProvider for ScriptedWallet {
    async fn connect(&self, trusted_only: bool) -> Result<Pubkey, ProviderError> {
        self.connect_calls.fetch_add(1, Ordering::Relaxed);
        if trusted_only {
            if !self.trusted.load(Ordering::Acquire) {
                return Err(ProviderError::Denied("origin not previously authorized".to_string()));
            }
            return Ok(self.keypair.pubkey());
        }
        if !self.approve_connect {
            return Err(ProviderError::Denied("user rejected the request".to_string()));
        }
        self.trusted.store(true, Ordering::Release);
        Ok(self.keypair.pubkey())
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn sign_transaction(&self, tx: &Transaction) -> Result<Transaction, ProviderError> {
        self.sign_calls.fetch_add(1, Ordering::Relaxed);
        if !self.approve_sign {
            return Err(ProviderError::SigningDenied("user rejected signing".to_string()));
        }
        let mut signed = tx.clone();
        let blockhash = signed.message.recent_blockhash;
        signed
            .try_sign(&[&self.keypair], blockhash)
            .map_err(|err| ProviderError::Internal(format!("scripted signing failed: {err}")))?;
        Ok(signed)
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<WalletEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }
}

/// Ledger double: records broadcasts, serves programmed reads.
pub struct ScriptedLedger {
    balances: Mutex<HashMap<Pubkey, u64>>,
    token_accounts: Mutex<HashMap<Pubkey, Vec<(Pubkey, Vec<u8>)>>>,
    accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    blockhash: Mutex<Hash>,
    broadcasts: Mutex<Vec<Transaction>>,
    statuses: Mutex<VecDeque<SignatureStatus>>,
    fail_balances: Mutex<Option<String>>,
    fail_blockhashes: Mutex<Option<String>>,
    fail_broadcasts: Mutex<Option<String>>,
}

impl ScriptedLedger {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            token_accounts: Mutex::new(HashMap::new()),
            accounts: Mutex::new(HashMap::new()),
            blockhash: Mutex::new(Hash::new_unique()),
            broadcasts: Mutex::new(Vec::new()),
            statuses: Mutex::new(VecDeque::new()),
            fail_balances: Mutex::new(None),
            fail_blockhashes: Mutex::new(None),
            fail_broadcasts: Mutex::new(None),
        }
    }

    pub fn set_balance(&self, address: Pubkey, lamports: u64) {
        self.balances.lock().unwrap().insert(address, lamports);
    }

    pub fn add_token_account(&self, owner: Pubkey, address: Pubkey, data: Vec<u8>) {
        self.token_accounts
            .lock()
            .unwrap()
            .entry(owner)
            .or_default()
            .push((address, data));
    }

    pub fn set_account(&self, address: Pubkey, data: Vec<u8>) {
        self.accounts.lock().unwrap().insert(address, data);
    }

    /// Move the chain forward; subsequent builds see a different blockhash.
    pub fn advance_blockhash(&self) {
        *self.blockhash.lock().unwrap() = Hash::new_unique();
    }

    /// Queue the next status-poll answers. An empty queue answers Confirmed.
    pub fn script_status(&self, status: SignatureStatus) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn fail_balances(&self, reason: &str) {
        *self.fail_balances.lock().unwrap() = Some(reason.to_string());
    }

    pub fn fail_blockhashes(&self, reason: &str) {
        *self.fail_blockhashes.lock().unwrap() = Some(reason.to_string());
    }

    pub fn fail_broadcasts(&self, reason: &str) {
        *self.fail_broadcasts.lock().unwrap() = Some(reason.to_string());
    }

    pub fn broadcasts(&self) -> Vec<Transaction> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().unwrap().len()
    }
}

impl Default for ScriptedLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerRpc for ScriptedLedger {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        if let Some(reason) = self.fail_balances.lock().unwrap().clone() {
            return Err(RpcError::Query(reason));
        }
        Ok(self.balances.lock().unwrap().get(address).copied().unwrap_or(0))
    }

    async fn token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        _program: &Pubkey,
    ) -> Result<Vec<(Pubkey, Vec<u8>)>, RpcError> {
        Ok(self
            .token_accounts
            .lock()
            .unwrap()
            .get(owner)
            .cloned()
            .unwrap_or_default())
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError> {
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }

    async fn latest_blockhash(&self) -> Result<Hash, RpcError> {
        if let Some(reason) = self.fail_blockhashes.lock().unwrap().clone() {
            return Err(RpcError::Query(reason));
        }
        Ok(*self.blockhash.lock().unwrap())
    }

    async fn broadcast(&self, tx: &Transaction) -> Result<Signature, RpcError> {
        if let Some(reason) = self.fail_broadcasts.lock().unwrap().clone() {
            return Err(RpcError::Query(reason));
        }
        let signature = tx.signatures.first().copied().unwrap_or_default();
        self.broadcasts.lock().unwrap().push(tx.clone());
        Ok(signature)
    }

    async fn signature_status(&self, _signature: &Signature) -> Result<SignatureStatus, RpcError> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SignatureStatus::Confirmed))
    }
}

/// Pack an initialized SPL token account image: mint, owner, amount, no
/// delegate, no native wrapping, no close authority.
pub fn encode_token_account(mint: &Pubkey, owner: &Pubkey, amount: u64) -> Vec<u8> {
    let mut data = vec![0u8; 165];
    data[0..32].copy_from_slice(mint.as_ref());
    data[32..64].copy_from_slice(owner.as_ref());
    data[64..72].copy_from_slice(&amount.to_le_bytes());
    // delegate: COption tag 0 (none) at 72..76
    data[108] = 1; // AccountState::Initialized
    // is_native / delegated_amount / close_authority stay zeroed
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::program_pack::Pack;
    use spl_token::state::Account as TokenAccount;

    #[test]
    fn encoded_token_account_round_trips_through_spl_unpack() {
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let account = TokenAccount::unpack(&encode_token_account(&mint, &owner, 500)).unwrap();
        assert_eq!(account.mint, mint);
        assert_eq!(account.owner, owner);
        assert_eq!(account.amount, 500);
    }

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let wallet = ScriptedWallet::trusted();
        let mut events = wallet.subscribe();
        let address = Pubkey::new_unique();

        wallet.emit(WalletEvent::AccountChanged(address));
        assert_eq!(events.recv().await, Some(WalletEvent::AccountChanged(address)));
    }
}
