//! Multi-chain Account Manager Library
//!
//! Deterministic account derivation and balance bookkeeping for Ethereum,
//! Polygon and Solana.

pub mod account;
pub mod chain;
pub mod config;
pub mod error;
pub mod keys;

// Re-export commonly used types
pub use account::{Account, AccountManager, AccountStore, StoreEvent};
pub use chain::{Address, Amount, Chain, ChainAdapter, ChainAdapters};
pub use config::Config;
pub use error::{BalanceQueryError, DerivationError, Error, Result};
pub use keys::{KeyProvider, MnemonicKeyProvider};
