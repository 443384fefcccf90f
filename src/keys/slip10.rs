//! SLIP-0010 ed25519 key derivation
//!
//! ed25519 only supports hardened children, so every path component is
//! hardened. Reference: https://github.com/satoshilabs/slips/blob/master/slip-0010.md

use ed25519_dalek::SigningKey;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::error::DerivationError;

type HmacSha512 = Hmac<Sha512>;

const ED25519_CURVE: &[u8] = b"ed25519 seed";
const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Private key and chain code at one node of the tree
pub struct ExtendedKey {
    private_key: Zeroizing<[u8; 32]>,
    chain_code: Zeroizing<[u8; 32]>,
}

impl ExtendedKey {
    /// Master node from a seed
    pub fn from_seed(seed: &[u8]) -> Result<Self, DerivationError> {
        Self::from_hmac(ED25519_CURVE, &[seed])
    }

    /// Hardened child at `index` (the hardened bit must not be set)
    pub fn derive_hardened(&self, index: u32) -> Result<Self, DerivationError> {
        if index >= HARDENED_OFFSET {
            return Err(DerivationError::IndexOutOfRange {
                index,
                max: HARDENED_OFFSET - 1,
            });
        }
        let child = (index | HARDENED_OFFSET).to_be_bytes();
        Self::from_hmac(&*self.chain_code, &[&[0x00], &*self.private_key, &child])
    }

    /// Walk a sequence of hardened indices from the master node
    pub fn derive_path(seed: &[u8], path: &[u32]) -> Result<Self, DerivationError> {
        path.iter()
            .try_fold(Self::from_seed(seed)?, |key, index| key.derive_hardened(*index))
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.private_key)
    }

    fn from_hmac(key: &[u8], parts: &[&[u8]]) -> Result<Self, DerivationError> {
        let mut mac = HmacSha512::new_from_slice(key)
            .map_err(|e| DerivationError::KeyDerivation(format!("HMAC init failed: {}", e)))?;
        for part in parts {
            mac.update(part);
        }
        let result = mac.finalize().into_bytes();

        let mut private_key = Zeroizing::new([0u8; 32]);
        let mut chain_code = Zeroizing::new([0u8; 32]);
        private_key.copy_from_slice(&result[..32]);
        chain_code.copy_from_slice(&result[32..]);

        Ok(Self {
            private_key,
            chain_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slip10_vector1_master() {
        // SLIP-0010 test vector 1 for ed25519
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let master = ExtendedKey::from_seed(&seed).unwrap();

        assert_eq!(
            hex::encode(*master.private_key),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );
        assert_eq!(
            hex::encode(*master.chain_code),
            "90046a93de5380a72b5e45010748567d5ea02bbf6522f979e05c0d8d8ca9fffb"
        );
    }

    #[test]
    fn test_slip10_vector1_first_child() {
        // m/0H
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let child = ExtendedKey::derive_path(&seed, &[0]).unwrap();

        assert_eq!(
            hex::encode(*child.private_key),
            "68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3"
        );
    }

    #[test]
    fn test_rejects_hardened_bit() {
        let master = ExtendedKey::from_seed(&[0u8; 64]).unwrap();
        assert!(matches!(
            master.derive_hardened(HARDENED_OFFSET),
            Err(DerivationError::IndexOutOfRange { .. })
        ));
    }
}
