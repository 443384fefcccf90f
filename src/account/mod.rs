//! Account management module
//!
//! Provides the derive-and-bookkeep layer consumed by the dashboard:
//! - Account store (authoritative account set, selected chain, change events)
//! - Account manager (derive + balance + commit, remove, refresh)
//! - Balance sync (periodic refresh of every account)
//!
//! # Architecture
//!
//! ```text
//! ChainAdapters → AccountManager → AccountStore → subscribers
//!                       ↑
//!                  BalanceSync
//! ```
//!
//! # Consistency
//!
//! - An account reaches the store fully formed (address + queried balance) or not at all
//! - `add_account` is serialized per chain; indices are never handed out twice
//! - Removal never renumbers the remaining accounts

pub mod manager;
pub mod store;
pub mod sync;
pub mod types;

pub use manager::AccountManager;
pub use store::{AccountStore, StoreSubscription};
pub use sync::BalanceSync;
pub use types::{Account, AccountSet, RefreshReport, StoreEvent};
