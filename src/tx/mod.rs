//! Greeting transaction pipeline
//!
//! Two halves: [`builder`] constructs the unsigned transaction (one empty
//! instruction addressed to the target account, fee payer set, fresh
//! blockhash attached), and [`submit`] drives it through the wallet and the
//! network. The lifecycle is strictly forward: a failure at any step
//! discards the attempt, and retrying means building a brand-new
//! transaction with a fresh blockhash.

pub mod builder;
pub mod submit;

pub use builder::{BuildError, TransactionBuilder, GREETING_PROGRAM_ID};
pub use submit::{Confirmation, SubmitError, SubmitOptions, SubmitStage, TransactionSubmitter};
