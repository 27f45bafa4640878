//! Cryptographic primitives for kapsul.
//!
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - Argon2id passphrase key derivation (`kdf`)
//! - Master key and HKDF sub-keys (`keys`)
//! - Unlock canary creation and verification (`canary`)

pub mod canary;
pub mod encryption;
pub mod kdf;
pub mod keys;

pub use canary::{create_canary, verify_canary};
pub use encryption::{decrypt, encrypt};
pub use kdf::{derive_key, generate_salt, Argon2Params};
pub use keys::MasterKey;
