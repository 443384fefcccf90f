//! Configuration loading and validation

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::chain::Chain;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub chains: ChainsConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Per-chain RPC settings
#[derive(Debug, Clone, Deserialize)]
pub struct ChainsConfig {
    #[serde(default = "default_ethereum")]
    pub ethereum: ChainConfig,
    #[serde(default = "default_polygon")]
    pub polygon: ChainConfig,
    #[serde(default = "default_solana")]
    pub solana: ChainConfig,
}

impl ChainsConfig {
    pub fn get(&self, chain: Chain) -> &ChainConfig {
        match chain {
            Chain::Ethereum => &self.ethereum,
            Chain::Polygon => &self.polygon,
            Chain::Solana => &self.solana,
        }
    }
}

impl Default for ChainsConfig {
    fn default() -> Self {
        Self {
            ethereum: default_ethereum(),
            polygon: default_polygon(),
            solana: default_solana(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    /// Balance query timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl ChainConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Where key material comes from
#[derive(Debug, Clone, Deserialize)]
pub struct KeysConfig {
    /// Environment variable holding the BIP-39 mnemonic
    #[serde(default = "default_mnemonic_env")]
    pub mnemonic_env: String,
    /// Environment variable holding the optional BIP-39 passphrase
    #[serde(default = "default_passphrase_env")]
    pub passphrase_env: String,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            mnemonic_env: default_mnemonic_env(),
            passphrase_env: default_passphrase_env(),
        }
    }
}

/// Background balance sync
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sync_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_sync_interval_secs(),
        }
    }
}

fn default_ethereum() -> ChainConfig {
    ChainConfig {
        rpc_url: "https://cloudflare-eth.com".to_string(),
        timeout_ms: default_timeout_ms(),
    }
}

fn default_polygon() -> ChainConfig {
    ChainConfig {
        rpc_url: "https://polygon-rpc.com".to_string(),
        timeout_ms: default_timeout_ms(),
    }
}

fn default_solana() -> ChainConfig {
    ChainConfig {
        rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
        timeout_ms: default_timeout_ms(),
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_mnemonic_env() -> String {
    "WALLET_MNEMONIC".to_string()
}

fn default_passphrase_env() -> String {
    "WALLET_PASSPHRASE".to_string()
}

fn default_true() -> bool {
    true
}

fn default_sync_interval_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Pick up WALLET_* variables from a local .env
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix WALLET__)
            .add_source(
                config::Environment::with_prefix("WALLET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for chain in Chain::ALL {
            let chain_config = self.chains.get(chain);

            let url = chain_config.rpc_url.trim();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("{} rpc_url must be an http(s) URL, got '{}'", chain, url);
            }

            if chain_config.timeout_ms == 0 {
                anyhow::bail!("{} timeout_ms must be positive", chain);
            }
        }

        if self.keys.mnemonic_env.trim().is_empty() {
            anyhow::bail!("keys.mnemonic_env cannot be empty");
        }

        if self.sync.enabled && self.sync.interval_secs == 0 {
            anyhow::bail!("sync.interval_secs must be positive");
        }

        Ok(())
    }
}
