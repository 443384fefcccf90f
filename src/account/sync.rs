//! Background balance synchronization
//!
//! Periodically refreshes the balance of every account on every chain.
//! Failures are logged and retried on the next tick; they never remove or
//! zero an account.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::manager::AccountManager;
use crate::chain::Chain;
use crate::config::SyncConfig;

/// Balance poller over an [`AccountManager`]
pub struct BalanceSync {
    manager: Arc<AccountManager>,
    config: SyncConfig,
    /// Shutdown signal
    shutdown: broadcast::Sender<()>,
    /// Set once the polling loop has been spawned
    started: AtomicBool,
}

impl BalanceSync {
    pub fn new(manager: Arc<AccountManager>, config: SyncConfig) -> Self {
        let (shutdown, _) = broadcast::channel(1);

        Self {
            manager,
            config,
            shutdown,
            started: AtomicBool::new(false),
        }
    }

    /// Refresh every chain once (chains run concurrently)
    pub async fn sync_once(manager: &AccountManager) -> usize {
        let reports = join_all(Chain::ALL.map(|chain| manager.refresh_all(chain))).await;
        let mut refreshed = 0;

        for report in reports {
            refreshed += report.refreshed.len();

            if !report.is_complete() {
                warn!(
                    "{} of {} {} balances failed to refresh",
                    report.failed.len(),
                    report.failed.len() + report.refreshed.len(),
                    report.chain
                );
            }
        }

        refreshed
    }

    /// Start the polling loop; returns `None` when sync is disabled or
    /// already started
    pub fn start(&self) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            info!("Balance sync disabled");
            return None;
        }

        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Balance sync already running");
            return None;
        }

        let poll_interval = Duration::from_secs(self.config.interval_secs);
        info!("Starting balance sync every {}s", self.config.interval_secs);

        let manager = self.manager.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        Some(tokio::spawn(async move {
            let mut interval = interval(poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let refreshed = Self::sync_once(&manager).await;
                        debug!("Balance sync refreshed {} accounts", refreshed);
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Balance sync shutting down");
                        break;
                    }
                }
            }
        }))
    }

    /// Stop the polling loop
    pub fn stop(&self) {
        let _ = self.shutdown.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStore;
    use crate::chain::{Address, Amount, BalanceClient, ChainAdapters, EvmAdapter, SolanaAdapter};
    use crate::error::BalanceQueryError;
    use crate::keys::tests::TEST_MNEMONIC;
    use crate::keys::{KeyProvider, MnemonicKeyProvider};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::atomic::AtomicU64;

    /// Balance grows by one on every query
    #[derive(Default)]
    struct Counter(AtomicU64);

    #[async_trait]
    impl BalanceClient for Counter {
        async fn query(&self, _address: &Address) -> Result<Amount, BalanceQueryError> {
            Ok(Decimal::from(self.0.fetch_add(1, Ordering::SeqCst)))
        }
    }

    fn manager() -> Arc<AccountManager> {
        let keys: Arc<dyn KeyProvider> =
            Arc::new(MnemonicKeyProvider::from_phrase(TEST_MNEMONIC, None).unwrap());
        let client = Arc::new(Counter::default());
        let timeout = Duration::from_secs(1);

        let adapters = ChainAdapters::new(
            Arc::new(EvmAdapter::new(Chain::Ethereum, keys.clone(), client.clone(), timeout).unwrap()),
            Arc::new(EvmAdapter::new(Chain::Polygon, keys.clone(), client.clone(), timeout).unwrap()),
            Arc::new(SolanaAdapter::new(keys, client, timeout)),
        )
        .unwrap();

        Arc::new(AccountManager::new(Arc::new(AccountStore::new()), adapters))
    }

    #[tokio::test]
    async fn test_sync_once_covers_all_chains() {
        let manager = manager();
        manager.add_account(Chain::Ethereum).await.unwrap();
        manager.add_account(Chain::Solana).await.unwrap();
        manager.add_account(Chain::Solana).await.unwrap();

        assert_eq!(BalanceSync::sync_once(&manager).await, 3);
    }

    #[tokio::test]
    async fn test_disabled_sync_does_not_start() {
        let sync = BalanceSync::new(
            manager(),
            SyncConfig {
                enabled: false,
                interval_secs: 1,
            },
        );
        assert!(sync.start().is_none());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let manager = manager();
        let account = manager.add_account(Chain::Polygon).await.unwrap();
        let mut events = manager.store().subscribe().await;

        let sync = BalanceSync::new(
            manager.clone(),
            SyncConfig {
                enabled: true,
                interval_secs: 3600,
            },
        );
        let handle = sync.start().unwrap();
        assert!(sync.start().is_none());

        // First tick fires immediately
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.chain(), Chain::Polygon);

        sync.stop();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();

        let stored = manager.accounts(Chain::Polygon).await;
        assert_eq!(stored[0].index(), account.index());
        assert_ne!(stored[0].balance(), account.balance());
    }
}
