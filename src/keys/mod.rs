//! Root key material
//!
//! Adapters never see a mnemonic, only the 64-byte BIP-39 seed handed out by a
//! [`KeyProvider`]. A provider with nothing loaded returns `None`, which
//! adapters turn into `DerivationError::MissingKeyMaterial`.

pub mod slip10;

use std::collections::HashMap;
use std::fmt;

use bip39::Mnemonic;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::chain::Chain;
use crate::error::{Error, Result};

/// 64-byte BIP-39 seed (zeroized on drop)
#[derive(Clone)]
pub struct RootSeed(Zeroizing<[u8; 64]>);

impl RootSeed {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Derive the seed from a mnemonic phrase and optional passphrase
    pub fn from_mnemonic(phrase: &str, passphrase: Option<&str>) -> Result<Self> {
        let mnemonic: Mnemonic = phrase.trim().parse()?;
        Ok(Self::from_bytes(mnemonic.to_seed(passphrase.unwrap_or(""))))
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for RootSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RootSeed(<redacted>)")
    }
}

/// Supplies root key material per chain
pub trait KeyProvider: Send + Sync {
    /// Seed for the chain, or `None` if nothing is loaded
    fn root_seed(&self, chain: Chain) -> Option<&RootSeed>;
}

/// Key provider backed by one mnemonic shared by every chain, with optional
/// per-chain overrides
#[derive(Debug, Default, Clone)]
pub struct MnemonicKeyProvider {
    default_seed: Option<RootSeed>,
    overrides: HashMap<Chain, RootSeed>,
}

impl MnemonicKeyProvider {
    /// Provider with no key material (every derivation fails)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Provider for a mnemonic phrase
    pub fn from_phrase(phrase: &str, passphrase: Option<&str>) -> Result<Self> {
        Ok(Self {
            default_seed: Some(RootSeed::from_mnemonic(phrase, passphrase)?),
            overrides: HashMap::new(),
        })
    }

    /// Load the mnemonic (and optional passphrase) from environment variables
    pub fn from_env(mnemonic_var: &str, passphrase_var: &str) -> Result<Self> {
        let phrase = std::env::var(mnemonic_var).map_err(|_| {
            Error::KeyMaterial(format!("Missing environment variable: {}", mnemonic_var))
        })?;
        let passphrase = std::env::var(passphrase_var).ok().filter(|p| !p.is_empty());

        let provider = Self::from_phrase(&phrase, passphrase.as_deref())?;
        info!(
            "Loaded key material from {} (passphrase: {})",
            mnemonic_var,
            if passphrase.is_some() { "yes" } else { "no" }
        );
        Ok(provider)
    }

    /// Use a distinct seed for one chain
    pub fn with_chain_seed(mut self, chain: Chain, seed: RootSeed) -> Self {
        debug!("Installing dedicated seed for {}", chain);
        self.overrides.insert(chain, seed);
        self
    }
}

impl KeyProvider for MnemonicKeyProvider {
    fn root_seed(&self, chain: Chain) -> Option<&RootSeed> {
        self.overrides.get(&chain).or(self.default_seed.as_ref())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_seed_from_mnemonic() {
        let seed = RootSeed::from_mnemonic(TEST_MNEMONIC, None).unwrap();
        // BIP-39 reference seed for the all-"abandon" mnemonic, empty passphrase
        assert_eq!(hex::encode(&seed.as_bytes()[..8]), "5eb00bbddcf06908");
    }

    #[test]
    fn test_invalid_mnemonic_rejected() {
        let result = MnemonicKeyProvider::from_phrase("abandon abandon", None);
        assert!(matches!(result, Err(Error::KeyMaterial(_))));
    }

    #[test]
    fn test_empty_provider_has_no_seed() {
        let provider = MnemonicKeyProvider::empty();
        for chain in Chain::ALL {
            assert!(provider.root_seed(chain).is_none());
        }
    }

    #[test]
    fn test_chain_override() {
        let provider = MnemonicKeyProvider::from_phrase(TEST_MNEMONIC, None)
            .unwrap()
            .with_chain_seed(Chain::Solana, RootSeed::from_bytes([7u8; 64]));

        assert_eq!(provider.root_seed(Chain::Solana).unwrap().as_bytes(), &[7u8; 64]);
        assert_ne!(provider.root_seed(Chain::Ethereum).unwrap().as_bytes(), &[7u8; 64]);
    }

    #[test]
    fn test_seed_debug_redacted() {
        let seed = RootSeed::from_bytes([1u8; 64]);
        assert_eq!(format!("{:?}", seed), "RootSeed(<redacted>)");
    }
}
