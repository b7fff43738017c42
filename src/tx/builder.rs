//! Unsigned greeting transaction construction

use std::sync::Arc;

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    transaction::Transaction,
};
use thiserror::Error;

use crate::rpc::{LedgerRpc, RpcError};

/// The deployed greeting program. Well known and fixed; not a runtime knob.
pub const GREETING_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("Hisce9kT8LzZv7jsBDx1q1h8c1AoKR4K178vpSodPH7s");

#[derive(Error, Debug)]
pub enum BuildError {
    /// A session-dependent build was attempted with no active session.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The blockhash fetch failed; the whole build fails with it. No
    /// retries here, the caller re-invokes from scratch.
    #[error("blockhash fetch failed: {0}")]
    Blockhash(#[from] RpcError),
}

pub struct TransactionBuilder {
    rpc: Arc<dyn LedgerRpc>,
}

impl TransactionBuilder {
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self { rpc }
    }

    /// Build the single-instruction greeting transaction for `target`.
    ///
    /// The instruction names the target account writable and carries no
    /// payload; every call to the program is a greeting. The target also
    /// pays the fee. The blockhash is fetched here, at build time, because
    /// the network rejects transactions built against a stale one; callers
    /// must not reuse a transaction across send attempts.
    pub async fn build_greeting(
        &self,
        target: Option<Pubkey>,
        program_id: &Pubkey,
    ) -> Result<Transaction, BuildError> {
        let target = target
            .ok_or_else(|| BuildError::Precondition("no active wallet session".to_string()))?;

        let instruction = Instruction::new_with_bytes(
            *program_id,
            &[],
            vec![AccountMeta::new(target, false)],
        );
        let mut tx = Transaction::new_with_payer(&[instruction], Some(&target));
        tx.message.recent_blockhash = self.rpc.latest_blockhash().await?;
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ScriptedLedger;

    fn builder(ledger: &Arc<ScriptedLedger>) -> TransactionBuilder {
        TransactionBuilder::new(ledger.clone())
    }

    #[tokio::test]
    async fn refuses_to_build_without_an_address() {
        let ledger = Arc::new(ScriptedLedger::new());
        let result = builder(&ledger).build_greeting(None, &GREETING_PROGRAM_ID).await;
        assert!(matches!(result, Err(BuildError::Precondition(_))));
    }

    #[tokio::test]
    async fn builds_one_empty_instruction_with_target_as_fee_payer() {
        let target = Pubkey::new_unique();
        let ledger = Arc::new(ScriptedLedger::new());

        let tx = builder(&ledger)
            .build_greeting(Some(target), &GREETING_PROGRAM_ID)
            .await
            .unwrap();

        assert_eq!(tx.message.instructions.len(), 1);
        let ix = &tx.message.instructions[0];
        assert!(ix.data.is_empty());
        assert_eq!(
            tx.message.account_keys[ix.program_id_index as usize],
            GREETING_PROGRAM_ID
        );
        // Fee payer is the first account key and it is the target itself.
        assert_eq!(tx.message.account_keys[0], target);
        assert_eq!(tx.message.header.num_required_signatures, 1);
    }

    #[tokio::test]
    async fn each_build_carries_a_fresh_blockhash() {
        let target = Pubkey::new_unique();
        let ledger = Arc::new(ScriptedLedger::new());
        let b = builder(&ledger);

        let first = b.build_greeting(Some(target), &GREETING_PROGRAM_ID).await.unwrap();
        ledger.advance_blockhash();
        let second = b.build_greeting(Some(target), &GREETING_PROGRAM_ID).await.unwrap();

        assert_ne!(first.message.recent_blockhash, second.message.recent_blockhash);
    }

    #[tokio::test]
    async fn blockhash_failure_fails_the_whole_build() {
        let ledger = Arc::new(ScriptedLedger::new());
        ledger.fail_blockhashes("behind");

        let result = builder(&ledger)
            .build_greeting(Some(Pubkey::new_unique()), &GREETING_PROGRAM_ID)
            .await;
        assert!(matches!(result, Err(BuildError::Blockhash(_))));
    }
}
