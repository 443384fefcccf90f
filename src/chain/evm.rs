//! EVM adapter (Ethereum, Polygon)
//!
//! Derivation follows BIP-44 as MetaMask does: `m/44'/60'/0'/0/{index}`.
//! Polygon reuses coin type 60, so index N has the same address on both
//! chains.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bip32::{DerivationPath, XPrv};
use k256::ecdsa::VerifyingKey;
use sha3::{Digest, Keccak256};
use tracing::debug;

use super::adapter::{check_index, query_with_timeout, ChainAdapter};
use super::rpc::BalanceClient;
use super::{Address, Amount, Chain};
use crate::error::{BalanceQueryError, DerivationError, Error, Result};
use crate::keys::KeyProvider;

/// BIP-44 path for an EVM account index
pub fn derivation_path(index: u32) -> String {
    format!("m/44'/60'/0'/0/{}", index)
}

/// Keccak-256 of the uncompressed public key (without the 0x04 tag), last 20 bytes
fn public_key_to_address(uncompressed: &[u8]) -> [u8; 20] {
    let key = match uncompressed {
        [0x04, rest @ ..] if rest.len() == 64 => rest,
        other => other,
    };
    let hash = Keccak256::digest(key);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// EIP-55 mixed-case checksum encoding
pub fn to_checksum_address(address: &[u8; 20]) -> String {
    let addr_hex = hex::encode(address);
    let hash = Keccak256::digest(addr_hex.as_bytes());

    let mut result = String::with_capacity(42);
    result.push_str("0x");

    for (i, c) in addr_hex.chars().enumerate() {
        let nibble = (hash[i / 2] >> (4 * (1 - i % 2))) & 0xf;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            result.push(c.to_ascii_uppercase());
        } else {
            result.push(c);
        }
    }

    result
}

/// Check `0x` + 40 hex digits (checksum casing is not enforced)
pub fn is_valid_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .map(|digits| digits.len() == 40 && digits.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// Derive the EVM address at `index` from a BIP-39 seed
pub fn derive_address(seed: &[u8], index: u32) -> std::result::Result<Address, DerivationError> {
    check_index(index)?;

    let path: DerivationPath = derivation_path(index)
        .parse()
        .map_err(|e| DerivationError::KeyDerivation(format!("Invalid derivation path: {}", e)))?;

    let xprv = XPrv::derive_from_path(seed, &path)
        .map_err(|e| DerivationError::KeyDerivation(format!("BIP-32 derivation failed: {}", e)))?;

    let verifying_key: &VerifyingKey = xprv.private_key().verifying_key();
    let public_key = verifying_key.to_encoded_point(false);
    let address = public_key_to_address(public_key.as_bytes());

    Ok(Address::new(to_checksum_address(&address)))
}

/// Adapter for an EVM chain
pub struct EvmAdapter {
    chain: Chain,
    keys: Arc<dyn KeyProvider>,
    client: Arc<dyn BalanceClient>,
    timeout: Duration,
}

impl EvmAdapter {
    /// Create an adapter; `chain` must be an EVM chain
    pub fn new(
        chain: Chain,
        keys: Arc<dyn KeyProvider>,
        client: Arc<dyn BalanceClient>,
        timeout: Duration,
    ) -> Result<Self> {
        if !chain.is_evm() {
            return Err(Error::Config(format!("{} is not an EVM chain", chain)));
        }

        Ok(Self {
            chain,
            keys,
            client,
            timeout,
        })
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn derive(&self, index: u32) -> std::result::Result<Address, DerivationError> {
        let seed = self
            .keys
            .root_seed(self.chain)
            .ok_or(DerivationError::MissingKeyMaterial(self.chain))?;

        let address = derive_address(seed.as_bytes(), index)?;
        debug!("Derived {} account {} at {}", self.chain, index, derivation_path(index));
        Ok(address)
    }

    async fn get_balance(&self, address: &Address) -> std::result::Result<Amount, BalanceQueryError> {
        if !is_valid_address(address.as_str()) {
            return Err(BalanceQueryError::InvalidAddress(address.to_string()));
        }
        query_with_timeout(self.client.as_ref(), address, self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::tests::TEST_MNEMONIC;
    use crate::keys::MnemonicKeyProvider;
    use rust_decimal::Decimal;

    struct Unreachable;

    #[async_trait]
    impl BalanceClient for Unreachable {
        async fn query(&self, _address: &Address) -> std::result::Result<Amount, BalanceQueryError> {
            Err(BalanceQueryError::NetworkUnavailable("offline".to_string()))
        }
    }

    struct Fixed;

    #[async_trait]
    impl BalanceClient for Fixed {
        async fn query(&self, _address: &Address) -> std::result::Result<Amount, BalanceQueryError> {
            Ok(Decimal::ONE)
        }
    }

    fn adapter(chain: Chain, keys: MnemonicKeyProvider) -> EvmAdapter {
        EvmAdapter::new(chain, Arc::new(keys), Arc::new(Unreachable), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_checksum_address() {
        let bytes: [u8; 20] = hex::decode("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed")
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(
            to_checksum_address(&bytes),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
    }

    #[test]
    fn test_known_address() {
        let keys = MnemonicKeyProvider::from_phrase(TEST_MNEMONIC, None).unwrap();
        let address = adapter(Chain::Ethereum, keys).derive(0).unwrap();
        assert_eq!(address.as_str(), "0x9858EfFD232B4033E47d90003D41EC34EcaEda94");
    }

    #[test]
    fn test_deterministic_and_distinct() {
        let keys = MnemonicKeyProvider::from_phrase(TEST_MNEMONIC, None).unwrap();
        let adapter = adapter(Chain::Ethereum, keys);

        let first = adapter.derive(1).unwrap();
        let again = adapter.derive(1).unwrap();
        let other = adapter.derive(2).unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert!(is_valid_address(first.as_str()));
    }

    #[test]
    fn test_polygon_shares_ethereum_scheme() {
        let keys = MnemonicKeyProvider::from_phrase(TEST_MNEMONIC, None).unwrap();
        let ethereum = adapter(Chain::Ethereum, keys.clone());
        let polygon = adapter(Chain::Polygon, keys);

        assert_eq!(ethereum.derive(3).unwrap(), polygon.derive(3).unwrap());
    }

    #[test]
    fn test_passphrase_changes_address() {
        let plain = MnemonicKeyProvider::from_phrase(TEST_MNEMONIC, None).unwrap();
        let salted = MnemonicKeyProvider::from_phrase(TEST_MNEMONIC, Some("password")).unwrap();

        assert_ne!(
            adapter(Chain::Ethereum, plain).derive(0).unwrap(),
            adapter(Chain::Ethereum, salted).derive(0).unwrap()
        );
    }

    #[test]
    fn test_derive_errors() {
        let empty = adapter(Chain::Polygon, MnemonicKeyProvider::empty());
        assert_eq!(
            empty.derive(0),
            Err(DerivationError::MissingKeyMaterial(Chain::Polygon))
        );

        let keys = MnemonicKeyProvider::from_phrase(TEST_MNEMONIC, None).unwrap();
        assert!(matches!(
            adapter(Chain::Ethereum, keys).derive(u32::MAX),
            Err(DerivationError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_rejects_non_evm_chain() {
        let result = EvmAdapter::new(
            Chain::Solana,
            Arc::new(MnemonicKeyProvider::empty()),
            Arc::new(Unreachable),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_get_balance() {
        let adapter = EvmAdapter::new(
            Chain::Ethereum,
            Arc::new(MnemonicKeyProvider::empty()),
            Arc::new(Fixed),
            Duration::from_secs(1),
        )
        .unwrap();

        let valid = Address::from("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
        assert_eq!(adapter.get_balance(&valid).await, Ok(Decimal::ONE));

        let invalid = Address::from("0x1234");
        assert!(matches!(
            adapter.get_balance(&invalid).await,
            Err(BalanceQueryError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_get_balance_network_error() {
        let keys = MnemonicKeyProvider::from_phrase(TEST_MNEMONIC, None).unwrap();
        let adapter = adapter(Chain::Ethereum, keys);
        let address = adapter.derive(0).unwrap();

        assert!(matches!(
            adapter.get_balance(&address).await,
            Err(BalanceQueryError::NetworkUnavailable(_))
        ));
    }
}
