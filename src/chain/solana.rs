//! Solana adapter
//!
//! Derivation follows the Phantom/Solflare layout `m/44'/501'/{index}'/0'`
//! (SLIP-0010, all hardened). The address is the base58 public key.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::adapter::{check_index, query_with_timeout, ChainAdapter};
use super::rpc::BalanceClient;
use super::{Address, Amount, Chain};
use crate::error::{BalanceQueryError, DerivationError};
use crate::keys::slip10::ExtendedKey;
use crate::keys::KeyProvider;

const PURPOSE: u32 = 44;
const COIN_TYPE: u32 = 501;

/// SLIP-0010 path for a Solana account index
pub fn derivation_path(index: u32) -> String {
    format!("m/{}'/{}'/{}'/0'", PURPOSE, COIN_TYPE, index)
}

/// Check that `address` is base58 of 32 bytes
pub fn is_valid_address(address: &str) -> bool {
    bs58::decode(address)
        .into_vec()
        .map(|bytes| bytes.len() == 32)
        .unwrap_or(false)
}

/// Derive the Solana address at `index` from a BIP-39 seed
pub fn derive_address(seed: &[u8], index: u32) -> Result<Address, DerivationError> {
    check_index(index)?;

    let key = ExtendedKey::derive_path(seed, &[PURPOSE, COIN_TYPE, index, 0])?;
    let verifying_key = key.signing_key().verifying_key();

    Ok(Address::new(bs58::encode(verifying_key.as_bytes()).into_string()))
}

/// Adapter for Solana
pub struct SolanaAdapter {
    keys: Arc<dyn KeyProvider>,
    client: Arc<dyn BalanceClient>,
    timeout: Duration,
}

impl SolanaAdapter {
    pub fn new(keys: Arc<dyn KeyProvider>, client: Arc<dyn BalanceClient>, timeout: Duration) -> Self {
        Self {
            keys,
            client,
            timeout,
        }
    }
}

#[async_trait]
impl ChainAdapter for SolanaAdapter {
    fn chain(&self) -> Chain {
        Chain::Solana
    }

    fn derive(&self, index: u32) -> Result<Address, DerivationError> {
        let seed = self
            .keys
            .root_seed(Chain::Solana)
            .ok_or(DerivationError::MissingKeyMaterial(Chain::Solana))?;

        let address = derive_address(seed.as_bytes(), index)?;
        debug!("Derived solana account {} at {}", index, derivation_path(index));
        Ok(address)
    }

    async fn get_balance(&self, address: &Address) -> Result<Amount, BalanceQueryError> {
        if !is_valid_address(address.as_str()) {
            return Err(BalanceQueryError::InvalidAddress(address.to_string()));
        }
        query_with_timeout(self.client.as_ref(), address, self.timeout).await
    }
}
