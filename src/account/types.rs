//! Core types for account bookkeeping
//!
//! Defines derived accounts, the per-chain account set, store events and
//! refresh reports.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chain::{Address, Amount, Chain};
use crate::error::BalanceQueryError;

/// A derived account with its last known balance
///
/// Only the account manager creates accounts; address and index never change
/// after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    chain: Chain,
    index: u32,
    address: Address,
    balance: Amount,
    created_at: DateTime<Utc>,
    balance_updated_at: DateTime<Utc>,
}

impl Account {
    pub(crate) fn new(chain: Chain, index: u32, address: Address, balance: Amount) -> Self {
        let now = Utc::now();
        Self {
            chain,
            index,
            address,
            balance,
            created_at: now,
            balance_updated_at: now,
        }
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    /// Derivation index, assigned once at creation
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Balance in the chain's native unit
    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn balance_updated_at(&self) -> DateTime<Utc> {
        self.balance_updated_at
    }

    /// One-based display label: "Account 1" for index 0
    pub fn label(&self) -> String {
        format!("Account {}", self.index as u64 + 1)
    }

    /// Balance with the native ticker, e.g. "1.5 ETH"
    pub fn display_balance(&self) -> String {
        format!("{} {}", self.balance, self.chain.ticker())
    }

    /// Record a balance observed by a query issued at `queried_at`
    pub(crate) fn set_balance(&mut self, balance: Amount, queried_at: DateTime<Utc>) {
        self.balance = balance;
        self.balance_updated_at = queried_at;
    }
}

/// Snapshot of every chain's accounts plus the selected chain
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountSet {
    pub selected_chain: Chain,
    pub accounts: BTreeMap<Chain, Vec<Account>>,
}

impl AccountSet {
    /// Accounts for `chain`, empty if none
    pub fn accounts(&self, chain: Chain) -> &[Account] {
        self.accounts.get(&chain).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of accounts across chains
    pub fn len(&self) -> usize {
        self.accounts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Change notification emitted by the store, one per mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    AccountAdded {
        account: Account,
    },
    AccountRemoved {
        chain: Chain,
        address: Address,
        index: u32,
    },
    BalanceUpdated {
        chain: Chain,
        address: Address,
        balance: Amount,
    },
    SelectedChainChanged {
        chain: Chain,
    },
}

impl StoreEvent {
    /// Chain the event concerns
    pub fn chain(&self) -> Chain {
        match self {
            StoreEvent::AccountAdded { account } => account.chain(),
            StoreEvent::AccountRemoved { chain, .. }
            | StoreEvent::BalanceUpdated { chain, .. }
            | StoreEvent::SelectedChainChanged { chain } => *chain,
        }
    }
}

impl std::fmt::Display for StoreEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreEvent::AccountAdded { account } => write!(
                f,
                "Added {} {} ({}): {}",
                account.chain(),
                account.label(),
                account.address(),
                account.display_balance()
            ),
            StoreEvent::AccountRemoved {
                chain,
                address,
                index,
            } => write!(f, "Removed {} index {} ({})", chain, index, address),
            StoreEvent::BalanceUpdated {
                chain,
                address,
                balance,
            } => write!(f, "Balance {} {}: {} {}", chain, address, balance, chain.ticker()),
            StoreEvent::SelectedChainChanged { chain } => write!(f, "Selected chain: {}", chain),
        }
    }
}

/// Outcome of refreshing every account on one chain
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub chain: Chain,
    pub refreshed: Vec<(Address, Amount)>,
    pub failed: Vec<(Address, BalanceQueryError)>,
}

impl RefreshReport {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            refreshed: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
