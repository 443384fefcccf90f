//! Chain adapter trait and the per-chain adapter set

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::rpc::{BalanceClient, EvmRpcClient, SolanaRpcClient};
use super::{Address, Amount, Chain, EvmAdapter, SolanaAdapter};
use crate::config::ChainsConfig;
use crate::error::{BalanceQueryError, DerivationError, Error, Result};
use crate::keys::KeyProvider;

/// Highest account index any chain derives (last index below the BIP-32
/// hardened boundary)
pub const MAX_DERIVATION_INDEX: u32 = 0x7FFF_FFFF;

/// Per-chain derivation and balance lookup
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Chain this adapter serves
    fn chain(&self) -> Chain;

    /// Address at `index`; a pure function of (key material, chain, index)
    fn derive(&self, index: u32) -> std::result::Result<Address, DerivationError>;

    /// Current native balance of `address` (network I/O, bounded by a timeout)
    async fn get_balance(&self, address: &Address) -> std::result::Result<Amount, BalanceQueryError>;
}

/// Reject indices past the derivation limit
pub(crate) fn check_index(index: u32) -> std::result::Result<(), DerivationError> {
    if index > MAX_DERIVATION_INDEX {
        return Err(DerivationError::IndexOutOfRange {
            index,
            max: MAX_DERIVATION_INDEX,
        });
    }
    Ok(())
}

/// Run a balance query under `timeout`
pub(crate) async fn query_with_timeout(
    client: &dyn BalanceClient,
    address: &Address,
    timeout: Duration,
) -> std::result::Result<Amount, BalanceQueryError> {
    match tokio::time::timeout(timeout, client.query(address)).await {
        Ok(result) => result,
        Err(_) => {
            debug!("Balance query for {} timed out after {:?}", address, timeout);
            Err(BalanceQueryError::Timeout(timeout))
        }
    }
}

/// One adapter per supported chain
///
/// Lookup is an exhaustive match on [`Chain`], so a new chain does not
/// compile until it has an adapter.
#[derive(Clone)]
pub struct ChainAdapters {
    ethereum: Arc<dyn ChainAdapter>,
    polygon: Arc<dyn ChainAdapter>,
    solana: Arc<dyn ChainAdapter>,
}

impl ChainAdapters {
    /// Build from explicit adapters
    pub fn new(
        ethereum: Arc<dyn ChainAdapter>,
        polygon: Arc<dyn ChainAdapter>,
        solana: Arc<dyn ChainAdapter>,
    ) -> Result<Self> {
        for (expected, adapter) in [
            (Chain::Ethereum, &ethereum),
            (Chain::Polygon, &polygon),
            (Chain::Solana, &solana),
        ] {
            if adapter.chain() != expected {
                return Err(Error::Config(format!(
                    "Adapter for {} registered under {}",
                    adapter.chain(),
                    expected
                )));
            }
        }

        Ok(Self {
            ethereum,
            polygon,
            solana,
        })
    }

    /// Build JSON-RPC backed adapters from configuration
    pub fn from_config(config: &ChainsConfig, keys: Arc<dyn KeyProvider>) -> Result<Self> {
        let ethereum = &config.ethereum;
        let polygon = &config.polygon;
        let solana = &config.solana;

        let ethereum_client = EvmRpcClient::new(&ethereum.rpc_url, ethereum.timeout())?;
        let polygon_client = EvmRpcClient::new(&polygon.rpc_url, polygon.timeout())?;
        let solana_client = SolanaRpcClient::new(&solana.rpc_url, solana.timeout())?;

        Self::new(
            Arc::new(EvmAdapter::new(
                Chain::Ethereum,
                keys.clone(),
                Arc::new(ethereum_client),
                ethereum.timeout(),
            )?),
            Arc::new(EvmAdapter::new(
                Chain::Polygon,
                keys.clone(),
                Arc::new(polygon_client),
                polygon.timeout(),
            )?),
            Arc::new(SolanaAdapter::new(
                keys,
                Arc::new(solana_client),
                solana.timeout(),
            )),
        )
    }

    /// Adapter for `chain`
    pub fn get(&self, chain: Chain) -> &Arc<dyn ChainAdapter> {
        match chain {
            Chain::Ethereum => &self.ethereum,
            Chain::Polygon => &self.polygon,
            Chain::Solana => &self.solana,
        }
    }
}
