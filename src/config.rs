//! Configuration loading from TOML files and environment variables.

use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cluster RPC configuration
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Wallet configuration
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Optional fungible-token tracking
    #[serde(default)]
    pub token: TokenConfig,

    /// Configuration blob store used by the CLI flow
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Cluster RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Commitment level: processed, confirmed or finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,

    /// Whether this origin counts as previously authorized, enabling the
    /// silent eager connect
    #[serde(default)]
    pub trusted: bool,

    /// Approve interactive connect requests without prompting
    #[serde(default = "default_true")]
    pub auto_approve: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Mint to report a token balance for; unset disables the token scan
    #[serde(default)]
    pub mint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the stored configuration blobs
    #[serde(default = "default_store_dir")]
    pub dir: String,
}

// Default value functions
fn default_rpc_url() -> String { "https://api.devnet.solana.com".to_string() }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_keypair_path() -> String { "~/.config/solana/id.json".to_string() }
fn default_store_dir() -> String { "store".to_string() }
fn default_true() -> bool { true }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            commitment: default_commitment(),
            timeout_secs: default_rpc_timeout(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
            trusted: false,
            auto_approve: default_true(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { dir: default_store_dir() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            wallet: WalletConfig::default(),
            token: TokenConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path))?;
        let config: Config = toml::from_str(&content).context("failed to parse config TOML")?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_file(path)
    }
}

impl RpcConfig {
    pub fn commitment(&self) -> CommitmentConfig {
        match self.commitment.as_str() {
            "processed" => CommitmentConfig::processed(),
            "confirmed" => CommitmentConfig::confirmed(),
            "finalized" => CommitmentConfig::finalized(),
            other => {
                tracing::warn!("unknown commitment '{}', defaulting to confirmed", other);
                CommitmentConfig::confirmed()
            }
        }
    }
}

impl TokenConfig {
    pub fn mint(&self) -> anyhow::Result<Option<Pubkey>> {
        self.mint
            .as_deref()
            .map(|raw| Pubkey::from_str(raw).with_context(|| format!("invalid token mint: {raw}")))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(!config.rpc.url.is_empty());
        assert_eq!(config.rpc.commitment(), CommitmentConfig::confirmed());
        assert_eq!(config.token.mint().unwrap(), None);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [wallet]
            keypair_path = "wallet.json"
            trusted = true

            [token]
            mint = "28kuPZq4tRBH6Zwpr1Dd1vYgjWYJAkQRMKDVSPQDPc7h"
            "#,
        )
        .unwrap();

        assert_eq!(config.wallet.keypair_path, "wallet.json");
        assert!(config.wallet.trusted);
        assert_eq!(config.rpc.timeout_secs, default_rpc_timeout());
        assert!(config.token.mint().unwrap().is_some());
    }

    #[test]
    fn bad_mint_is_rejected() {
        let config = TokenConfig { mint: Some("not-a-pubkey!!".to_string()) };
        assert!(config.mint().is_err());
    }
}
