//! Binary capsule container format.
//!
//! A capsule has this layout:
//!
//! ```text
//! [KAPS: 4 bytes][format: 1 byte][config_len: 4 bytes LE][config JSON][index JSON][trailer: 32 bytes]
//! ```
//!
//! - **Magic** (`KAPS`): identifies the file as a capsule.
//! - **Format**: container layout version (currently `1`). This is not the
//!   repository version in the configuration, which is gated separately.
//! - **Config length**: little-endian u32 telling us where the config JSON
//!   ends and the index JSON begins.
//! - **Trailer**: HMAC-SHA256 over config + index for encrypted capsules,
//!   plain SHA-256 for plaintext ones.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::errors::{KapsulError, Result};

/// Magic bytes at the start of every capsule.
const MAGIC: &[u8; 4] = b"KAPS";

/// Current container layout version.
pub const CONTAINER_FORMAT: u8 = 1;

/// Size of the trailer (SHA-256 = 32 bytes).
pub const TRAILER_LEN: usize = 32;

/// Fixed-size prefix: 4 (magic) + 1 (format) + 4 (config_len).
const PREFIX_LEN: usize = 9;

/// The sections of a capsule, as raw bytes exactly as stored.
///
/// The trailer must be verified over these bytes, never over a
/// re-serialization.
#[derive(Debug, Clone)]
pub struct RawCapsule {
    pub config_bytes: Vec<u8>,
    pub index_bytes: Vec<u8>,
    pub trailer: Vec<u8>,
}

/// Split a serialized capsule into its sections.
pub fn parse_capsule(data: &[u8]) -> Result<RawCapsule> {
    if data.len() < PREFIX_LEN + TRAILER_LEN {
        return Err(KapsulError::InvalidCapsule(
            "file too small to be a capsule".into(),
        ));
    }

    if &data[0..4] != MAGIC {
        return Err(KapsulError::InvalidCapsule("missing KAPS magic bytes".into()));
    }

    let format = data[4];
    if format != CONTAINER_FORMAT {
        return Err(KapsulError::InvalidCapsule(format!(
            "unsupported container format {format}, expected {CONTAINER_FORMAT}"
        )));
    }

    let config_len_u32 = u32::from_le_bytes(
        data[5..9]
            .try_into()
            .map_err(|_| KapsulError::InvalidCapsule("bad config length".into()))?,
    );
    let config_len = usize::try_from(config_len_u32).map_err(|_| {
        KapsulError::InvalidCapsule(format!(
            "config length {config_len_u32} exceeds platform address space"
        ))
    })?;

    let config_end = PREFIX_LEN + config_len;
    if config_end + TRAILER_LEN > data.len() {
        return Err(KapsulError::InvalidCapsule(
            "config length exceeds file size".into(),
        ));
    }

    let index_end = data.len() - TRAILER_LEN;
    Ok(RawCapsule {
        config_bytes: data[PREFIX_LEN..config_end].to_vec(),
        index_bytes: data[config_end..index_end].to_vec(),
        trailer: data[index_end..].to_vec(),
    })
}

/// Assemble a capsule from serialized config and index sections.
///
/// `index_key` is `Some` for encrypted capsules (HMAC trailer).
pub fn build_capsule(
    config_bytes: &[u8],
    index_bytes: &[u8],
    index_key: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let config_len = u32::try_from(config_bytes.len()).map_err(|_| {
        KapsulError::SerializationError(format!(
            "config length {} exceeds u32::MAX",
            config_bytes.len()
        ))
    })?;
    let trailer = compute_trailer(index_key, config_bytes, index_bytes)?;

    let mut buf =
        Vec::with_capacity(PREFIX_LEN + config_bytes.len() + index_bytes.len() + TRAILER_LEN);
    buf.extend_from_slice(MAGIC);
    buf.push(CONTAINER_FORMAT);
    buf.extend_from_slice(&config_len.to_le_bytes());
    buf.extend_from_slice(config_bytes);
    buf.extend_from_slice(index_bytes);
    buf.extend_from_slice(&trailer);
    Ok(buf)
}

fn compute_trailer(
    index_key: Option<&[u8]>,
    config_bytes: &[u8],
    index_bytes: &[u8],
) -> Result<Vec<u8>> {
    match index_key {
        Some(key) => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key)
                .map_err(|e| KapsulError::EncryptionFailed(format!("invalid HMAC key: {e}")))?;
            mac.update(config_bytes);
            mac.update(index_bytes);
            Ok(mac.finalize().into_bytes().to_vec())
        }
        None => {
            let mut hasher = Sha256::new();
            hasher.update(config_bytes);
            hasher.update(index_bytes);
            Ok(hasher.finalize().to_vec())
        }
    }
}

/// Verify the trailer of a raw capsule.
///
/// The HMAC path uses `verify_slice`, which compares in constant time.
pub fn verify_trailer(raw: &RawCapsule, index_key: Option<&[u8]>) -> Result<()> {
    match index_key {
        Some(key) => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key)
                .map_err(|e| KapsulError::EncryptionFailed(format!("invalid HMAC key: {e}")))?;
            mac.update(&raw.config_bytes);
            mac.update(&raw.index_bytes);
            mac.verify_slice(&raw.trailer)
                .map_err(|_| KapsulError::IntegrityMismatch)
        }
        None => {
            let expected = compute_trailer(None, &raw.config_bytes, &raw.index_bytes)?;
            if expected == raw.trailer {
                Ok(())
            } else {
                Err(KapsulError::IntegrityMismatch)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&BASE64.encode(data))
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}
