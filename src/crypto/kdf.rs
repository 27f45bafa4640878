//! Passphrase-based key derivation using Argon2id.
//!
//! The parameters travel with the capsule (`KdfParams` in the repository
//! configuration) so a capsule always re-derives its key with exactly the
//! settings it was created with.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::Zeroize;

use super::keys::{MasterKey, KEY_LEN};
use crate::errors::{KapsulError, Result};
use crate::storage::config::KdfParams;

/// Length of the salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// The only algorithm identifier this build understands.
pub const ALGORITHM_ARGON2ID: &str = "argon2id";

/// Minimum safe memory cost in KiB (8 MB).
pub const MIN_MEMORY_KIB: u32 = 8_192;

/// Maximum memory cost in KiB (4 GiB). Parameters come from the capsule
/// itself, so anything larger is refused before Argon2 allocates.
pub const MAX_MEMORY_KIB: u32 = 4 * 1024 * 1024;

/// Maximum number of Argon2 passes.
pub const MAX_ITERATIONS: u32 = 64;

/// Maximum parallelism lanes.
pub const MAX_PARALLELISM: u32 = 64;

/// Argon2id cost parameters used when a new capsule is created.
///
/// These map 1:1 to the fields in `Settings` so `.kapsul.toml` can tune them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl Argon2Params {
    /// Build fresh `KdfParams` for a new capsule, with a random salt.
    pub fn to_kdf_params(self) -> KdfParams {
        KdfParams {
            algorithm: ALGORITHM_ARGON2ID.to_string(),
            salt: generate_salt().to_vec(),
            memory_kib: self.memory_kib,
            iterations: self.iterations,
            parallelism: self.parallelism,
        }
    }
}

/// Derive the capsule master key from a candidate secret.
///
/// Same params + same secret always yield the same key. Malformed
/// parameters are an error, never a silently weaker derivation.
pub fn derive_key(params: &KdfParams, secret: &[u8]) -> Result<MasterKey> {
    if params.algorithm != ALGORITHM_ARGON2ID {
        return Err(KapsulError::KeyDerivationFailed(format!(
            "unsupported KDF algorithm '{}'",
            params.algorithm
        )));
    }
    if params.salt.is_empty() {
        return Err(KapsulError::KeyDerivationFailed("empty salt".into()));
    }
    if params.memory_kib < MIN_MEMORY_KIB {
        return Err(KapsulError::KeyDerivationFailed(format!(
            "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
            params.memory_kib
        )));
    }
    if params.memory_kib > MAX_MEMORY_KIB {
        return Err(KapsulError::KeyDerivationFailed(format!(
            "Argon2 memory_kib must be at most {MAX_MEMORY_KIB} (got {})",
            params.memory_kib
        )));
    }
    if !(1..=MAX_ITERATIONS).contains(&params.iterations) {
        return Err(KapsulError::KeyDerivationFailed(format!(
            "Argon2 iterations must be between 1 and {MAX_ITERATIONS} (got {})",
            params.iterations
        )));
    }
    if !(1..=MAX_PARALLELISM).contains(&params.parallelism) {
        return Err(KapsulError::KeyDerivationFailed(format!(
            "Argon2 parallelism must be between 1 and {MAX_PARALLELISM} (got {})",
            params.parallelism
        )));
    }

    let argon2_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| KapsulError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(secret, &params.salt, &mut key)
        .map_err(|e| KapsulError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}")))?;

    let master = MasterKey::new(key);
    key.zeroize();
    Ok(master)
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
