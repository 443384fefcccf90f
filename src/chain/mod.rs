//! Chain adapters
//!
//! One adapter per supported chain, each able to:
//! - Derive the address at an account index from root key material
//! - Query the native balance of an address (bounded by a timeout)
//!
//! # Architecture
//!
//! ```text
//! KeyProvider ──→ ChainAdapter::derive(index)
//!                       │
//! BalanceClient ──→ ChainAdapter::get_balance(address)
//! ```
//!
//! Ethereum and Polygon share the EVM scheme (`m/44'/60'/0'/0/i`),
//! Solana uses SLIP-0010 ed25519 (`m/44'/501'/i'/0'`).

pub mod adapter;
pub mod evm;
pub mod rpc;
pub mod solana;

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub use adapter::{ChainAdapter, ChainAdapters, MAX_DERIVATION_INDEX};
pub use evm::EvmAdapter;
pub use rpc::{BalanceClient, EvmRpcClient, SolanaRpcClient};
pub use solana::SolanaAdapter;

/// Balance in the chain's native unit (ETH, MATIC, SOL)
pub type Amount = Decimal;

/// Supported chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    #[default]
    Ethereum,
    Polygon,
    Solana,
}

impl Chain {
    /// Every supported chain, in display order
    pub const ALL: [Chain; 3] = [Chain::Ethereum, Chain::Polygon, Chain::Solana];

    /// Lowercase identifier, as used in config keys
    pub fn name(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Polygon => "polygon",
            Chain::Solana => "solana",
        }
    }

    /// Native currency ticker
    pub fn ticker(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ETH",
            Chain::Polygon => "MATIC",
            Chain::Solana => "SOL",
        }
    }

    /// Decimals between the smallest on-chain unit and the native unit
    pub fn decimals(&self) -> u32 {
        match self {
            Chain::Ethereum | Chain::Polygon => 18,
            Chain::Solana => 9,
        }
    }

    /// Check if this chain uses the EVM address scheme
    pub fn is_evm(&self) -> bool {
        matches!(self, Chain::Ethereum | Chain::Polygon)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ethereum" | "eth" => Ok(Chain::Ethereum),
            "polygon" | "matic" => Ok(Chain::Polygon),
            "solana" | "sol" => Ok(Chain::Solana),
            other => Err(Error::UnknownChain(other.to_string())),
        }
    }
}

/// Chain-specific address encoding, opaque to the account manager
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
