//! Unlock canary.
//!
//! A capsule stores a small ciphertext of a known plaintext next to its KDF
//! parameters. A derived key is trusted only if it decrypts the canary back
//! to that plaintext; no real data has to be touched to tell a wrong
//! passphrase from a right one.

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::encryption::{decrypt, encrypt};
use super::keys::MasterKey;
use crate::errors::Result;
use crate::storage::config::EncryptionDescriptor;

const CANARY_PLAINTEXT: &[u8] = b"kapsul canary v1";

/// Encrypt the canary plaintext under `key`'s canary sub-key.
pub fn create_canary(key: &MasterKey) -> Result<Vec<u8>> {
    let mut canary_key = key.canary_key()?;
    let canary = encrypt(&canary_key, CANARY_PLAINTEXT);
    canary_key.zeroize();
    canary
}

/// Check `key` against the descriptor's canary.
///
/// A mismatch means "wrong secret" and is reported as `false`, not as an
/// error; the caller decides whether that is retryable.
pub fn verify_canary(descriptor: &EncryptionDescriptor, key: &MasterKey) -> bool {
    let Ok(mut canary_key) = key.canary_key() else {
        return false;
    };
    let plaintext = decrypt(&canary_key, &descriptor.canary);
    canary_key.zeroize();

    match plaintext {
        Ok(bytes) => bytes.as_slice().ct_eq(CANARY_PLAINTEXT).into(),
        Err(_) => false,
    }
}
