//! Repository configuration: the versioned descriptor at the head of every
//! capsule.
//!
//! Stored as JSON inside the container. It carries the format version used
//! for the compatibility gate and, for encrypted capsules, the KDF
//! parameters plus the unlock canary.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::format::{base64_decode, base64_encode};
use crate::errors::{KapsulError, Result};

/// Repository format version this build reads and writes.
pub const VERSION: &str = "1.0.0";

/// A `major.minor.patch` format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The version compiled into this build (`VERSION`).
    pub fn current() -> Self {
        // VERSION is a literal checked by `current_version_parses`.
        VERSION.parse().unwrap_or(Self::new(0, 0, 0))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = KapsulError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || KapsulError::InvalidConfig(format!("invalid version '{s}'"));
        let mut parts = s.split('.');
        let mut next = || -> Result<u32> {
            parts
                .next()
                .ok_or_else(invalid)?
                .parse::<u32>()
                .map_err(|_| invalid())
        };
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// How a passphrase is turned into the capsule key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: String,
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

/// KDF parameters plus the canary used to verify a derived key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionDescriptor {
    pub kdf: KdfParams,
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub canary: Vec<u8>,
}

/// Deserialized capsule configuration. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub version: Version,
    pub repository_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionDescriptor>,
}

impl Configuration {
    /// A configuration for a brand-new capsule at the current version.
    pub fn new(encryption: Option<EncryptionDescriptor>) -> Self {
        let mut id = [0u8; 16];
        rand::RngCore::fill_bytes(&mut rand::rng(), &mut id);
        Self {
            version: Version::current(),
            repository_id: hex::encode(id),
            created_at: Utc::now(),
            encryption,
        }
    }

    /// Parse and validate the serialized configuration envelope.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(bytes)
            .map_err(|e| KapsulError::InvalidConfig(format!("configuration JSON: {e}")))?;

        if let Some(ref enc) = config.encryption {
            if enc.kdf.salt.is_empty() {
                return Err(KapsulError::InvalidConfig("empty KDF salt".into()));
            }
            if enc.canary.is_empty() {
                return Err(KapsulError::InvalidConfig("empty canary".into()));
            }
        }

        Ok(config)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| KapsulError::SerializationError(format!("configuration: {e}")))
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    /// Strict equality gate against the build's `VERSION`.
    pub fn check_version(&self) -> Result<()> {
        let expected = Version::current();
        if self.version != expected {
            return Err(KapsulError::VersionMismatch {
                expected: expected.to_string(),
                actual: self.version.to_string(),
            });
        }
        Ok(())
    }
}
