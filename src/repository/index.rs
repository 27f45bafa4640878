//! Content-addressed capsule index.
//!
//! The index lists every entry (path, size, mode, mtime) and points at a
//! blob by address. Identical contents share one blob. In a plaintext
//! capsule the address is the SHA-256 of the contents; in an encrypted one
//! it is an HMAC under the address sub-key, so equal-content probes from
//! outside learn nothing, and blobs hold AES-GCM ciphertext.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::crypto::{decrypt, encrypt, MasterKey};
use crate::errors::{KapsulError, Result};
use crate::storage::format::{base64_decode, base64_encode};

/// A file recorded in the capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Slash-separated path inside the capsule.
    pub path: String,
    pub address: String,
    pub size: u64,
    pub mode: u32,
    pub modified: DateTime<Utc>,
}

/// Stored contents, possibly encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub entries: Vec<Entry>,
    pub blobs: BTreeMap<String, Blob>,
}

impl Index {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| KapsulError::InvalidCapsule(format!("index JSON: {e}")))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| KapsulError::SerializationError(format!("index: {e}")))
    }
}

/// Address of `data`: keyed HMAC when `key` is set, SHA-256 otherwise.
pub fn content_address(key: Option<&MasterKey>, data: &[u8]) -> Result<String> {
    match key {
        Some(key) => {
            let mut address_key = key.address_key()?;
            let mac = Hmac::<Sha256>::new_from_slice(&address_key);
            address_key.zeroize();
            let mut mac = mac
                .map_err(|e| KapsulError::EncryptionFailed(format!("invalid HMAC key: {e}")))?;
            mac.update(data);
            Ok(hex::encode(mac.finalize().into_bytes()))
        }
        None => Ok(sha256_hex(data)),
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Encrypt (or pass through) contents for storage.
pub fn seal(key: Option<&MasterKey>, data: &[u8]) -> Result<Blob> {
    let data = match key {
        Some(key) => {
            let mut data_key = key.data_key()?;
            let sealed = encrypt(&data_key, data);
            data_key.zeroize();
            sealed?
        }
        None => data.to_vec(),
    };
    Ok(Blob { data })
}

/// Inverse of `seal`.
pub fn unseal(key: Option<&MasterKey>, blob: &Blob) -> Result<Vec<u8>> {
    match key {
        Some(key) => {
            let mut data_key = key.data_key()?;
            let plain = decrypt(&data_key, &blob.data);
            data_key.zeroize();
            plain
        }
        None => Ok(blob.data.clone()),
    }
}
