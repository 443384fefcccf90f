//! Account store
//!
//! Authoritative in-memory account set. Every mutation publishes one
//! [`StoreEvent`] to each subscriber while the write lock is still held, so
//! subscribers observe events in commit order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use super::types::{Account, AccountSet, StoreEvent};
use crate::chain::{Address, Amount, Chain};
use crate::error::{Error, Result};

/// Receiving end of a store subscription
pub type StoreSubscription = mpsc::UnboundedReceiver<StoreEvent>;

#[derive(Debug, Default)]
struct ChainAccounts {
    accounts: Vec<Account>,
    /// Next index to hand out; never decreases, so removed indices are not reused
    next_index: u32,
}

#[derive(Debug, Default)]
struct StoreState {
    chains: HashMap<Chain, ChainAccounts>,
    selected_chain: Chain,
    subscribers: Vec<mpsc::UnboundedSender<StoreEvent>>,
}

impl StoreState {
    fn chain(&self, chain: Chain) -> Option<&ChainAccounts> {
        self.chains.get(&chain)
    }

    fn chain_mut(&mut self, chain: Chain) -> &mut ChainAccounts {
        self.chains.entry(chain).or_default()
    }

    fn publish(&mut self, event: StoreEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Shared account store
#[derive(Debug, Default)]
pub struct AccountStore {
    state: RwLock<StoreState>,
}

impl AccountStore {
    /// Create an empty store with the default selected chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the accounts for `chain`, in insertion order
    pub async fn get_accounts(&self, chain: Chain) -> Vec<Account> {
        let state = self.state.read().await;
        state
            .chain(chain)
            .map(|c| c.accounts.clone())
            .unwrap_or_default()
    }

    /// Look up one account by address
    pub async fn get_account(&self, chain: Chain, address: &Address) -> Option<Account> {
        let state = self.state.read().await;
        state
            .chain(chain)
            .and_then(|c| c.accounts.iter().find(|a| a.address() == address))
            .cloned()
    }

    /// Index the next derived account on `chain` will receive
    pub async fn next_index(&self, chain: Chain) -> u32 {
        let state = self.state.read().await;
        state.chain(chain).map(|c| c.next_index).unwrap_or(0)
    }

    /// Append a fully formed account to its chain
    pub async fn commit(&self, chain: Chain, account: Account) -> Result<()> {
        if account.chain() != chain {
            return Err(Error::Internal(format!(
                "Account for {} committed under {}",
                account.chain(),
                chain
            )));
        }

        let mut state = self.state.write().await;
        let entry = state.chain_mut(chain);

        if entry.accounts.iter().any(|a| a.address() == account.address()) {
            return Err(Error::DuplicateAccount {
                chain,
                address: account.address().to_string(),
            });
        }

        if account.index() < entry.next_index {
            return Err(Error::DuplicateIndex {
                chain,
                index: account.index(),
            });
        }

        entry.next_index = account.index().saturating_add(1);
        entry.accounts.push(account.clone());

        debug!(
            "Committed {} account {} ({} total)",
            chain,
            account.index(),
            entry.accounts.len()
        );

        state.publish(StoreEvent::AccountAdded { account });
        Ok(())
    }

    /// Remove the account with `address`; returns whether one was removed
    pub async fn remove(&self, chain: Chain, address: &Address) -> bool {
        let mut state = self.state.write().await;
        let entry = state.chain_mut(chain);

        let Some(position) = entry.accounts.iter().position(|a| a.address() == address) else {
            return false;
        };

        let removed = entry.accounts.remove(position);
        info!("Removed {} account {} ({})", chain, removed.index(), address);

        state.publish(StoreEvent::AccountRemoved {
            chain,
            address: address.clone(),
            index: removed.index(),
        });
        true
    }

    /// Replace the balance of an existing account with one observed by a
    /// query issued at `queried_at`
    ///
    /// Returns `Ok(false)` without publishing when the stored balance comes
    /// from a more recent query.
    pub async fn update_balance(
        &self,
        chain: Chain,
        address: &Address,
        balance: Amount,
        queried_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state.write().await;

        let account = state
            .chain_mut(chain)
            .accounts
            .iter_mut()
            .find(|a| a.address() == address)
            .ok_or_else(|| Error::AccountNotFound {
                chain,
                address: address.to_string(),
            })?;

        if account.balance_updated_at() > queried_at {
            debug!(
                "Ignoring stale {} balance for {} (queried {}, stored {})",
                chain,
                address,
                queried_at,
                account.balance_updated_at()
            );
            return Ok(false);
        }

        account.set_balance(balance, queried_at);

        state.publish(StoreEvent::BalanceUpdated {
            chain,
            address: address.clone(),
            balance,
        });
        Ok(true)
    }

    pub async fn selected_chain(&self) -> Chain {
        self.state.read().await.selected_chain
    }

    pub async fn set_selected_chain(&self, chain: Chain) {
        let mut state = self.state.write().await;
        state.selected_chain = chain;
        state.publish(StoreEvent::SelectedChainChanged { chain });
    }

    /// Full copy of the account set
    pub async fn snapshot(&self) -> AccountSet {
        let state = self.state.read().await;
        AccountSet {
            selected_chain: state.selected_chain,
            accounts: state
                .chains
                .iter()
                .map(|(chain, c)| (*chain, c.accounts.clone()))
                .collect(),
        }
    }

    /// Receive every future mutation as a [`StoreEvent`]
    pub async fn subscribe(&self) -> StoreSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.write().await.subscribers.push(tx);
        rx
    }

    /// Number of live subscribers
    pub async fn subscriber_count(&self) -> usize {
        let mut state = self.state.write().await;
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }
}
