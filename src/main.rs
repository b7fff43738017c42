//! greeter - command-line client for the on-chain greeting program
//!
//! Detects the configured wallet, establishes a session, and runs one of
//! the user actions: report balances, send a greeting, or read back how
//! many greetings an account has received.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![warn(unused_must_use)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use greeter::app::BalanceFeed;
use greeter::balances::BalanceResolver;
use greeter::config::Config;
use greeter::provider::{KeypairWallet, WalletProvider};
use greeter::rpc::{HttpLedgerRpc, LedgerRpc};
use greeter::session::WalletSession;
use greeter::store::{ConfigStore, StoreError, StoredConfig};
use greeter::tx::{SubmitOptions, TransactionBuilder, TransactionSubmitter, GREETING_PROGRAM_ID};

/// Key the CLI stores its greeting record under.
const STORE_KEY: &str = "greeter";

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "greeter.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the connected wallet's native and token balances
    Balances,
    /// Send a greeting to the connected wallet's account
    Greet,
    /// Report how many times the account has been greeted
    Count,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let config = load_config(&args.config)?;
    let rpc: Arc<dyn LedgerRpc> = Arc::new(HttpLedgerRpc::new(
        &config.rpc.url,
        config.rpc.commitment(),
        Duration::from_secs(config.rpc.timeout_secs),
    ));

    let mut session = WalletSession::new();
    let available = session.detect(detect_provider(&config)?).await;
    if !available {
        anyhow::bail!(
            "no wallet available: keypair not found at {}",
            config.wallet.keypair_path
        );
    }
    if !session.connected() {
        session.connect().await.context("wallet connect failed")?;
    }
    let address = session.address().context("connected without an address")?;
    info!(address = %address, "wallet session established");

    match args.command {
        Command::Balances => {
            let mint = config.token.mint()?;
            let feed = BalanceFeed::new(rpc.clone(), mint);
            feed.refresh(&session.snapshot()).await?;

            let view = feed.view().await;
            match view.native() {
                Some(balance) => {
                    info!(lamports = balance.amount, sol = balance.ui(), "native balance")
                }
                None => info!("native balance unresolved"),
            }
            if let Some(mint) = mint {
                match view.token() {
                    Some(balance) => {
                        info!(mint = %mint, amount = balance.amount, ui = balance.ui(), "token balance")
                    }
                    None => info!(mint = %mint, "no token account for configured mint"),
                }
            }
        }

        Command::Greet => {
            let store = ConfigStore::new(&config.store.dir);
            match store.load(STORE_KEY) {
                Ok(previous) => {
                    if let Some(signature) = previous.get("last_signature") {
                        info!(signature = %signature, "previous greeting");
                    }
                }
                Err(StoreError::NotFound(_)) => {}
                Err(err) => return Err(err).context("reading greeting history"),
            }

            let builder = TransactionBuilder::new(rpc.clone());
            let tx = builder
                .build_greeting(session.address(), &GREETING_PROGRAM_ID)
                .await?;

            let provider = session
                .provider()
                .context("session lost its provider")?;
            let submitter = TransactionSubmitter::new(rpc.clone(), SubmitOptions::default());
            let confirmation = submitter.submit(tx, provider.as_ref()).await?;
            info!(signature = %confirmation.signature, "greeting confirmed");

            let mut record = StoredConfig::new();
            record.insert("address".to_string(), address.to_string());
            record.insert("last_signature".to_string(), confirmation.signature.to_string());
            store
                .save(STORE_KEY, &record)
                .context("persisting greeting record")?;

            report_count(&rpc, &address).await?;
        }

        Command::Count => {
            report_count(&rpc, &address).await?;
        }
    }

    Ok(())
}

async fn report_count(rpc: &Arc<dyn LedgerRpc>, address: &greeter::Pubkey) -> Result<()> {
    let resolver = BalanceResolver::new(rpc.clone());
    match resolver.greeting_count(address).await? {
        Some(count) => info!(address = %address, count, "greetings recorded on chain"),
        None => info!(address = %address, "account has not been greeted yet"),
    }
    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        "greeter=debug,info"
    } else {
        "greeter=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("failed to load config from {}", path))
    } else {
        warn!("config file '{}' not found, using defaults", path);
        Ok(Config::default())
    }
}

/// The host-environment capability check: a readable keypair file is our
/// injected wallet. A missing file is absence, not an error.
fn detect_provider(config: &Config) -> Result<Option<Arc<dyn WalletProvider>>> {
    let path = &config.wallet.keypair_path;
    if !Path::new(path).exists() {
        return Ok(None);
    }
    let wallet = KeypairWallet::from_file(path, config.wallet.trusted, config.wallet.auto_approve)
        .context("failed to load wallet keypair")?;
    Ok(Some(Arc::new(wallet)))
}
