//! Repository handle over an opened (or not-yet-existing) capsule.
//!
//! - Content-addressed index and blob sealing (`index`)
//! - Building new capsules (`writer`)
//! - Location normalization, version gate and unlock sequencing (`open`)

pub mod index;
pub mod open;
pub mod writer;

use crate::crypto::MasterKey;
use crate::errors::{KapsulError, Result};
use crate::storage::{self, format, Configuration, Store, StoreParams};

pub use index::{Entry, Index};
pub use open::{normalize_location, open_capsule};
pub use writer::CapsuleWriter;

struct Opened {
    store: Store,
    config: Configuration,
    key: Option<MasterKey>,
    index: Index,
}

/// A live capsule. Owned by the dispatcher and released with `close`.
pub struct Repository {
    location: String,
    opened: Option<Opened>,
}

impl Repository {
    /// Build a handle from an opened store.
    ///
    /// `key` must be the verified key for encrypted capsules. The integrity
    /// trailer is checked before the index is trusted.
    pub fn new(key: Option<&MasterKey>, store: Store, serialized_config: &[u8]) -> Result<Self> {
        let config = Configuration::from_bytes(serialized_config)?;
        if config.is_encrypted() && key.is_none() {
            return Err(KapsulError::CantUnlock);
        }
        let key = key.filter(|_| config.is_encrypted()).cloned();

        let index_key = key.as_ref().map(MasterKey::index_key).transpose()?;
        format::verify_trailer(store.raw(), index_key.as_ref().map(|k| k.as_slice()))?;

        let index = Index::from_bytes(&store.raw().index_bytes)?;

        Ok(Self {
            location: store.location(),
            opened: Some(Opened {
                store,
                config,
                key,
                index,
            }),
        })
    }

    /// A handle for a capsule that does not exist yet (create path).
    pub fn inexistent(params: &StoreParams) -> Result<Self> {
        let location = params
            .get(storage::LOCATION_KEY)
            .filter(|l| !l.is_empty())
            .ok_or(KapsulError::NoLocation)?;
        Ok(Self {
            location: location.clone(),
            opened: None,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn exists(&self) -> bool {
        self.opened.is_some()
    }

    fn opened(&self) -> Result<&Opened> {
        self.opened
            .as_ref()
            .ok_or_else(|| KapsulError::CapsuleNotFound(self.location.clone()))
    }

    pub fn configuration(&self) -> Result<&Configuration> {
        Ok(&self.opened()?.config)
    }

    pub fn is_encrypted(&self) -> bool {
        self.opened
            .as_ref()
            .is_some_and(|o| o.config.is_encrypted())
    }

    /// All entries, sorted by path.
    pub fn entries(&self) -> Result<&[Entry]> {
        Ok(&self.opened()?.index.entries)
    }

    /// Entries equal to `prefix` or below it as a directory.
    pub fn entries_under(&self, prefix: &str) -> Result<Vec<&Entry>> {
        let prefix = prefix.trim_matches('/');
        Ok(self
            .entries()?
            .iter()
            .filter(|e| {
                prefix.is_empty()
                    || e.path == prefix
                    || e.path
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .collect())
    }

    pub fn entry(&self, path: &str) -> Result<&Entry> {
        let path = path.trim_matches('/');
        self.entries()?
            .iter()
            .find(|e| e.path == path)
            .ok_or_else(|| KapsulError::EntryNotFound(path.to_string()))
    }

    /// Read and verify an entry's contents.
    pub fn read(&self, entry: &Entry) -> Result<Vec<u8>> {
        let opened = self.opened()?;
        let blob = opened.index.blobs.get(&entry.address).ok_or_else(|| {
            KapsulError::InvalidCapsule(format!("missing blob for '{}'", entry.path))
        })?;

        let data = index::unseal(opened.key.as_ref(), blob)?;
        if index::content_address(opened.key.as_ref(), &data)? != entry.address {
            return Err(KapsulError::IntegrityMismatch);
        }
        Ok(data)
    }

    /// Re-check the container trailer.
    pub fn verify_trailer(&self) -> Result<()> {
        let opened = self.opened()?;
        let index_key = opened.key.as_ref().map(MasterKey::index_key).transpose()?;
        format::verify_trailer(opened.store.raw(), index_key.as_ref().map(|k| k.as_slice()))
    }

    /// Number of distinct blobs (after deduplication).
    pub fn blob_count(&self) -> Result<usize> {
        Ok(self.opened()?.index.blobs.len())
    }

    pub fn transport(&self) -> Option<&'static str> {
        self.opened.as_ref().map(|o| o.store.scheme())
    }

    /// Release the store and wipe the key.
    pub fn close(self) {
        tracing::debug!(location = %self.location, "closing repository");
        drop(self);
    }
}
