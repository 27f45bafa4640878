//! Building new capsules.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path};

use chrono::{DateTime, Utc};

use super::index::{self, Entry, Index};
use crate::crypto::kdf::Argon2Params;
use crate::crypto::{create_canary, derive_key, MasterKey};
use crate::errors::{KapsulError, Result};
use crate::storage::format;
use crate::storage::{Configuration, EncryptionDescriptor};

/// Fresh encryption material for a new capsule: KDF params with a random
/// salt, the derived key, and the canary proving it.
pub fn new_encryption(
    params: Argon2Params,
    passphrase: &[u8],
) -> Result<(EncryptionDescriptor, MasterKey)> {
    let kdf = params.to_kdf_params();
    let key = derive_key(&kdf, passphrase)?;
    let canary = create_canary(&key)?;
    Ok((EncryptionDescriptor { kdf, canary }, key))
}

/// Accumulates entries, then serializes a complete capsule.
pub struct CapsuleWriter {
    config: Configuration,
    key: Option<MasterKey>,
    index: Index,
    paths: BTreeSet<String>,
}

impl CapsuleWriter {
    /// `key` is required exactly when `config` declares encryption.
    pub fn new(config: Configuration, key: Option<MasterKey>) -> Result<Self> {
        if config.is_encrypted() != key.is_some() {
            return Err(KapsulError::InvalidConfig(
                "encryption descriptor and key must be given together".into(),
            ));
        }
        Ok(Self {
            config,
            key,
            index: Index::default(),
            paths: BTreeSet::new(),
        })
    }

    pub fn entry_count(&self) -> usize {
        self.index.entries.len()
    }

    /// Add one entry from memory.
    pub fn add_bytes(
        &mut self,
        path: &str,
        data: &[u8],
        mode: u32,
        modified: DateTime<Utc>,
    ) -> Result<()> {
        let path = path.trim_matches('/');
        if path.is_empty() || path.split('/').any(|c| c.is_empty() || c == "." || c == "..") {
            return Err(KapsulError::CommandFailed(format!(
                "invalid entry path '{path}'"
            )));
        }
        if self.paths.contains(path) {
            return Err(KapsulError::CommandFailed(format!(
                "duplicate entry '{path}'"
            )));
        }

        let address = index::content_address(self.key.as_ref(), data)?;
        if !self.index.blobs.contains_key(&address) {
            let blob = index::seal(self.key.as_ref(), data)?;
            self.index.blobs.insert(address.clone(), blob);
        }

        self.paths.insert(path.to_string());
        self.index.entries.push(Entry {
            path: path.to_string(),
            address,
            size: data.len() as u64,
            mode,
            modified,
        });
        Ok(())
    }

    /// Add a file, or a directory recursively. Entries are named relative
    /// to the parent of `source`; symlinks are skipped.
    ///
    /// Returns the number of entries added.
    pub fn add_path(&mut self, source: &Path) -> Result<usize> {
        let base = source.parent().unwrap_or(Path::new(""));
        self.add_tree(base, source)
    }

    fn add_tree(&mut self, base: &Path, path: &Path) -> Result<usize> {
        let meta = fs::symlink_metadata(path)?;

        if meta.file_type().is_symlink() {
            tracing::debug!(path = %path.display(), "skipping symlink");
            return Ok(0);
        }

        if meta.is_dir() {
            let mut children: Vec<_> = fs::read_dir(path)?
                .map(|e| e.map(|e| e.path()))
                .collect::<std::io::Result<_>>()?;
            children.sort();

            let mut added = 0;
            for child in children {
                added += self.add_tree(base, &child)?;
            }
            return Ok(added);
        }

        let name = entry_name(base, path)?;
        let data = fs::read(path)?;
        let modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        self.add_bytes(&name, &data, file_mode(&meta), modified)?;
        Ok(1)
    }

    /// Serialize the capsule.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.index.entries.sort_by(|a, b| a.path.cmp(&b.path));

        let config_bytes = self.config.to_bytes()?;
        let index_bytes = self.index.to_bytes()?;
        let index_key = self.key.as_ref().map(MasterKey::index_key).transpose()?;

        format::build_capsule(
            &config_bytes,
            &index_bytes,
            index_key.as_ref().map(|k| k.as_slice()),
        )
    }
}

fn entry_name(base: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(base).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return Err(KapsulError::CommandFailed(format!(
            "cannot name entry for {}",
            path.display()
        )));
    }
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(meta: &fs::Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}
