//! wallet-accounts - derive multi-chain accounts and keep their balances fresh
//!
//! Key material is read from the environment (see `keys.mnemonic_env`), never
//! from the config file.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use wallet_accounts::account::BalanceSync;
use wallet_accounts::{
    AccountManager, AccountStore, Chain, ChainAdapters, Config, KeyProvider, MnemonicKeyProvider,
};

/// Multi-chain account manager
#[derive(Parser)]
#[command(name = "wallet-accounts")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive accounts on one chain and print them with balances
    Derive {
        /// Chain: ethereum, polygon or solana
        #[arg(long)]
        chain: Chain,

        /// Number of accounts to derive
        #[arg(long, default_value = "1")]
        count: u32,
    },

    /// Derive accounts on every chain and keep their balances in sync
    Watch {
        /// Accounts to derive per chain
        #[arg(long, default_value = "1")]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.log_json)?;

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let manager = match build_manager(&config) {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            error!("Startup failed: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Derive { chain, count } => derive(&manager, chain, count).await,
        Commands::Watch { count } => watch(manager, &config, count).await,
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    let filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive("wallet_accounts=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// Wire key material, adapters and the store together
fn build_manager(config: &Config) -> Result<AccountManager> {
    let keys: Arc<dyn KeyProvider> = Arc::new(
        MnemonicKeyProvider::from_env(&config.keys.mnemonic_env, &config.keys.passphrase_env)
            .context("Failed to load key material")?,
    );

    let adapters =
        ChainAdapters::from_config(&config.chains, keys).context("Failed to build chain adapters")?;

    Ok(AccountManager::new(Arc::new(AccountStore::new()), adapters))
}

async fn derive(manager: &AccountManager, chain: Chain, count: u32) -> Result<()> {
    for _ in 0..count {
        let account = manager
            .add_account(chain)
            .await
            .with_context(|| format!("Failed to add {} account", chain))?;

        println!(
            "{:<12} {:<46} {}",
            account.label(),
            account.address(),
            account.display_balance()
        );
    }
    Ok(())
}

async fn watch(manager: Arc<AccountManager>, config: &Config, count: u32) -> Result<()> {
    let mut events = manager.store().subscribe().await;

    for chain in Chain::ALL {
        for _ in 0..count {
            // Keep going on network errors; the failed index is simply retried next time
            if let Err(e) = manager.add_account(chain).await {
                warn!("Could not add {} account: {}", chain, e);
                break;
            }
        }
    }

    let sync = BalanceSync::new(manager.clone(), config.sync.clone());
    let handle = sync.start();

    loop {
        tokio::select! {
            Some(event) = events.recv() => info!("{}", event),
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, stopping");
                break;
            }
        }
    }

    sync.stop();
    if let Some(handle) = handle {
        handle.await.context("Balance sync task failed")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_json_flag() {
        let cli = Cli::try_parse_from(["wallet-accounts", "--log-json", "derive", "--chain", "sol"]).unwrap();
        assert!(cli.log_json);
        assert!(matches!(
            cli.command,
            Commands::Derive {
                chain: Chain::Solana,
                count: 1
            }
        ));

        let cli = Cli::try_parse_from(["wallet-accounts", "watch", "--count", "2", "--log-json"]).unwrap();
        assert!(cli.log_json);

        let cli = Cli::try_parse_from(["wallet-accounts", "watch"]).unwrap();
        assert!(!cli.log_json);
    }
}
