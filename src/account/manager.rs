//! Account manager - derive, add, remove and refresh accounts
//!
//! Coordinates chain adapters and the account store. The manager holds no
//! account state of its own; every operation reads and writes through the
//! store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::store::AccountStore;
use super::types::{Account, RefreshReport};
use crate::chain::{Address, Amount, Chain, ChainAdapters};
use crate::error::{Error, Result};

/// Core account manager
pub struct AccountManager {
    /// Authoritative account state
    store: Arc<AccountStore>,

    /// One adapter per chain
    adapters: ChainAdapters,

    /// Serializes `add_account` per chain so an index is never handed out twice
    add_locks: HashMap<Chain, Arc<Mutex<()>>>,
}

impl AccountManager {
    /// Create a manager over an existing store
    pub fn new(store: Arc<AccountStore>, adapters: ChainAdapters) -> Self {
        let add_locks = Chain::ALL
            .into_iter()
            .map(|chain| (chain, Arc::new(Mutex::new(()))))
            .collect();

        Self {
            store,
            adapters,
            add_locks,
        }
    }

    /// The store this manager writes to
    pub fn store(&self) -> &Arc<AccountStore> {
        &self.store
    }

    /// Current accounts for `chain`
    pub async fn accounts(&self, chain: Chain) -> Vec<Account> {
        self.store.get_accounts(chain).await
    }

    /// Derive the next account on `chain`, fetch its balance and commit it
    ///
    /// Either the account is committed with its queried balance, or the store
    /// is left untouched and the adapter or store error is returned. The
    /// sequence runs on its own task: dropping the returned future does not
    /// cancel it, and the store never sees a half-built account.
    pub async fn add_account(&self, chain: Chain) -> Result<Account> {
        let lock = self.add_lock(chain)?;
        let store = self.store.clone();
        let adapter = self.adapters.get(chain).clone();

        let task = tokio::spawn(async move {
            let _guard = lock.lock_owned().await;

            let index = store.next_index(chain).await;
            let address = adapter.derive(index).map_err(|e| {
                warn!("Derivation failed for {} index {}: {}", chain, index, e);
                e
            })?;

            debug!("Querying balance for {} account {} ({})", chain, index, address);
            let balance = adapter.get_balance(&address).await.map_err(|e| {
                warn!("Balance query failed for {} {}: {}", chain, address, e);
                e
            })?;

            let account = Account::new(chain, index, address, balance);
            store.commit(chain, account.clone()).await?;

            info!(
                "Added {} {} ({}): {}",
                chain,
                account.label(),
                account.address(),
                account.display_balance()
            );

            Ok::<_, Error>(account)
        });

        task.await?
    }

    /// Remove the account with `address` from `chain`
    ///
    /// Missing accounts are not an error. Remaining accounts keep their
    /// indices. Returns whether an account was removed.
    pub async fn remove_account(&self, chain: Chain, address: &Address) -> bool {
        let removed = self.store.remove(chain, address).await;
        if !removed {
            debug!("Remove ignored, no {} account {}", chain, address);
        }
        removed
    }

    /// Re-query the balance of an existing account and store it
    ///
    /// Concurrent refreshes of one account may finish out of order; the store
    /// keeps the result of the query issued last. Returns the queried balance.
    pub async fn refresh_balance(&self, chain: Chain, address: &Address) -> Result<Amount> {
        if self.store.get_account(chain, address).await.is_none() {
            return Err(Error::AccountNotFound {
                chain,
                address: address.to_string(),
            });
        }

        let queried_at = Utc::now();
        let balance = self.adapters.get(chain).get_balance(address).await?;

        // The account may have been removed while the query was in flight
        if self.store.update_balance(chain, address, balance, queried_at).await? {
            debug!("Refreshed {} {}: {} {}", chain, address, balance, chain.ticker());
        }
        Ok(balance)
    }

    /// Refresh every account on `chain`, collecting failures instead of stopping
    pub async fn refresh_all(&self, chain: Chain) -> RefreshReport {
        let mut report = RefreshReport::new(chain);

        for account in self.store.get_accounts(chain).await {
            let address = account.address().clone();
            match self.refresh_balance(chain, &address).await {
                Ok(balance) => report.refreshed.push((address, balance)),
                Err(Error::BalanceQuery(e)) => {
                    warn!("Failed to refresh {} {}: {}", chain, address, e);
                    report.failed.push((address, e));
                }
                // Removed mid-refresh
                Err(Error::AccountNotFound { .. }) => {}
                Err(e) => warn!("Unexpected refresh error for {} {}: {}", chain, address, e),
            }
        }

        report
    }

    fn add_lock(&self, chain: Chain) -> Result<Arc<Mutex<()>>> {
        self.add_locks
            .get(&chain)
            .cloned()
            .ok_or_else(|| Error::Internal(format!("No add lock for {}", chain)))
    }
}
