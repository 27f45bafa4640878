//! Capsule container: write, open, tamper, wrong key.

mod common;

use std::fs;

use chrono::Utc;
use tempfile::TempDir;

use kapsul::context::Context;
use kapsul::crypto::{derive_key, MasterKey};
use kapsul::errors::KapsulError;
use kapsul::repository::index::sha256_hex;
use kapsul::repository::writer::new_encryption;
use kapsul::repository::{CapsuleWriter, Repository};
use kapsul::storage::{self, Configuration};

use common::{encrypted_capsule, fast_params, plaintext_capsule};

fn open_raw(dir: &TempDir, name: &str) -> (storage::Store, Vec<u8>) {
    let ctx = Context::new(dir.path().to_path_buf());
    storage::open(&ctx, &storage::location_params(name)).unwrap()
}

fn key_for(serialized: &[u8], passphrase: &str) -> MasterKey {
    let config = Configuration::from_bytes(serialized).unwrap();
    let descriptor = config.encryption.unwrap();
    derive_key(&descriptor.kdf, passphrase.as_bytes()).unwrap()
}

#[test]
fn plaintext_round_trip() {
    let dir = TempDir::new().unwrap();
    plaintext_capsule(
        dir.path(),
        "p.ptar",
        &[("b.txt", b"bee"), ("a/x.bin", &[0, 1, 2, 255])],
    );

    let (store, serialized) = open_raw(&dir, "p.ptar");
    assert_eq!(store.scheme(), "fs");
    let repo = Repository::new(None, store, &serialized).unwrap();

    let paths: Vec<_> = repo.entries().unwrap().iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, ["a/x.bin", "b.txt"]);

    let bin = repo.entry("a/x.bin").unwrap();
    assert_eq!(bin.size, 4);
    assert_eq!(repo.read(bin).unwrap(), [0, 1, 2, 255]);
    assert_eq!(bin.address, sha256_hex(&[0, 1, 2, 255]));
}

#[test]
fn encrypted_round_trip_and_dedup() {
    let dir = TempDir::new().unwrap();
    encrypted_capsule(
        dir.path(),
        "e.ptar",
        "pass phrase",
        &[("one", b"same"), ("two", b"same"), ("three", b"different")],
    );

    let (store, serialized) = open_raw(&dir, "e.ptar");
    let key = key_for(&serialized, "pass phrase");
    let repo = Repository::new(Some(&key), store, &serialized).unwrap();

    assert!(repo.is_encrypted());
    assert_eq!(repo.entries().unwrap().len(), 3);
    assert_eq!(repo.blob_count().unwrap(), 2);

    let one = repo.entry("one").unwrap();
    assert_eq!(repo.read(one).unwrap(), b"same");
    // Keyed addresses: the plaintext digest does not appear.
    assert_ne!(one.address, sha256_hex(b"same"));
}

#[test]
fn encrypted_contents_are_not_stored_in_clear() {
    let dir = TempDir::new().unwrap();
    let path = encrypted_capsule(
        dir.path(),
        "e.ptar",
        "pass phrase",
        &[("secret.txt", b"the launch codes are 0000")],
    );
    let bytes = fs::read(path).unwrap();
    let needle = b"launch codes";
    assert!(!bytes.windows(needle.len()).any(|w| w == needle));
}

#[test]
fn encrypted_capsule_needs_a_key() {
    let dir = TempDir::new().unwrap();
    encrypted_capsule(dir.path(), "e.ptar", "pw", &[("a", b"a")]);
    let (store, serialized) = open_raw(&dir, "e.ptar");
    assert!(matches!(
        Repository::new(None, store, &serialized),
        Err(KapsulError::CantUnlock)
    ));
}

#[test]
fn wrong_key_fails_integrity() {
    let dir = TempDir::new().unwrap();
    encrypted_capsule(dir.path(), "e.ptar", "pw", &[("a", b"a")]);
    let (store, serialized) = open_raw(&dir, "e.ptar");
    let wrong = key_for(&serialized, "not the pw");
    assert!(matches!(
        Repository::new(Some(&wrong), store, &serialized),
        Err(KapsulError::IntegrityMismatch)
    ));
}

#[test]
fn flipped_byte_is_detected() {
    let dir = TempDir::new().unwrap();
    let path = plaintext_capsule(dir.path(), "p.ptar", &[("a.txt", b"some contents here")]);

    let mut bytes = fs::read(&path).unwrap();
    let at = bytes.len() - 40;
    bytes[at] ^= 0x01;
    fs::write(&path, bytes).unwrap();

    let ctx = Context::new(dir.path().to_path_buf());
    let result = storage::open(&ctx, &storage::location_params("p.ptar"))
        .and_then(|(store, serialized)| Repository::new(None, store, &serialized));
    assert!(matches!(
        result,
        Err(KapsulError::IntegrityMismatch | KapsulError::InvalidCapsule(_))
    ));
}

#[test]
fn not_a_capsule() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("junk"), b"definitely not a capsule").unwrap();
    let ctx = Context::new(dir.path().to_path_buf());
    assert!(matches!(
        storage::open(&ctx, &storage::location_params("junk")),
        Err(KapsulError::InvalidCapsule(_))
    ));
}

#[test]
fn missing_capsule() {
    let dir = TempDir::new().unwrap();
    let ctx = Context::new(dir.path().to_path_buf());
    assert!(matches!(
        storage::open(&ctx, &storage::location_params("nope.ptar")),
        Err(KapsulError::CapsuleNotFound(_))
    ));
}

#[test]
fn unsupported_transports() {
    let ctx = Context::new(std::env::temp_dir());
    assert!(matches!(
        storage::open(&ctx, &storage::location_params("sftp://host/x.ptar")),
        Err(KapsulError::UnsupportedTransport(_))
    ));
    assert!(matches!(
        storage::open(&ctx, &storage::location_params("s3://bucket/x")),
        Err(KapsulError::UnsupportedTransport(_))
    ));
}

#[test]
fn create_never_overwrites() {
    let dir = TempDir::new().unwrap();
    let ctx = Context::new(dir.path().to_path_buf());
    let params = storage::location_params("new.ptar");

    let (descriptor, key) = new_encryption(fast_params(), b"pw").unwrap();
    let mut writer = CapsuleWriter::new(Configuration::new(Some(descriptor)), Some(key)).unwrap();
    writer.add_bytes("f", b"1", 0o600, Utc::now()).unwrap();
    let bytes = writer.finish().unwrap();

    storage::create(&ctx, &params, &bytes).unwrap();
    assert!(matches!(
        storage::create(&ctx, &params, &bytes),
        Err(KapsulError::CapsuleAlreadyExists(_))
    ));
}

#[test]
fn inexistent_handle_has_no_data() {
    let repo = Repository::inexistent(&storage::location_params("later.ptar")).unwrap();
    assert!(!repo.exists());
    assert_eq!(repo.location(), "later.ptar");
    assert!(matches!(
        repo.entries(),
        Err(KapsulError::CapsuleNotFound(_))
    ));
    assert!(Repository::inexistent(&storage::location_params("")).is_err());
}
