//! Master key and HKDF-SHA256 sub-keys.
//!
//! The master key comes out of Argon2id. Everything else is derived from
//! it with a distinct HKDF `info` label so each use gets an independent key:
//!
//! - canary key: encrypts the unlock canary in the configuration
//! - data key: encrypts blob contents
//! - address key: keyed content addressing (HMAC) for encrypted capsules
//! - index key: authenticates the capsule trailer

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::errors::{KapsulError, Result};

/// Length of the master key and derived sub-keys (256 bits).
pub const KEY_LEN: usize = 32;

const CANARY_INFO: &[u8] = b"kapsul-canary";
const DATA_INFO: &[u8] = b"kapsul-data";
const ADDRESS_INFO: &[u8] = b"kapsul-address";
const INDEX_INFO: &[u8] = b"kapsul-index";

fn hkdf_derive(ikm: &[u8], info: &[u8]) -> Result<[u8; KEY_LEN]> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = [0u8; KEY_LEN];
    hk.expand(info, &mut okm)
        .map_err(|e| KapsulError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

/// A verified (or about to be verified) 32-byte capsule key.
///
/// Zeroed on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    pub fn canary_key(&self) -> Result<[u8; KEY_LEN]> {
        hkdf_derive(&self.bytes, CANARY_INFO)
    }

    pub fn data_key(&self) -> Result<[u8; KEY_LEN]> {
        hkdf_derive(&self.bytes, DATA_INFO)
    }

    pub fn address_key(&self) -> Result<[u8; KEY_LEN]> {
        hkdf_derive(&self.bytes, ADDRESS_INFO)
    }

    pub fn index_key(&self) -> Result<[u8; KEY_LEN]> {
        hkdf_derive(&self.bytes, INDEX_INFO)
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}
