//! Execution context threaded through every component.
//!
//! Created once in `main`, mutated by flag handling (working directory,
//! concurrency) and by the unlock sequence (the verified key), dropped at
//! process exit. There is no global state: every entry point takes the
//! context explicitly.

use std::fs;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::config::Settings;
use crate::crypto::MasterKey;
use crate::errors::{KapsulError, Result};

pub struct Context {
    /// Directory relative locations are resolved against.
    pub cwd: PathBuf,

    /// Worker limit for parallel capsule operations.
    pub max_concurrency: usize,

    /// Project settings (`.kapsul.toml` merged with CLI overrides).
    pub settings: Settings,

    /// Passphrase supplied out-of-band at startup (`--keyfile`).
    key_from_file: Option<Zeroizing<String>>,

    /// The verified capsule key, once unlocked.
    secret: Option<MasterKey>,
}

impl Context {
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            max_concurrency: 1,
            settings: Settings::default(),
            key_from_file: None,
            secret: None,
        }
    }

    pub fn set_key_from_file(&mut self, passphrase: Zeroizing<String>) {
        self.key_from_file = Some(passphrase);
    }

    pub fn key_from_file(&self) -> Option<&str> {
        self.key_from_file.as_deref().map(String::as_str)
    }

    /// Attach the verified key. A second call replaces the first.
    pub fn set_secret(&mut self, key: MasterKey) {
        self.secret = Some(key);
    }

    pub fn secret(&self) -> Option<&MasterKey> {
        self.secret.as_ref()
    }
}

/// Turn the `-c` flag into a worker count.
///
/// `0` means "all cores but one" (at least one). Negative values or more
/// cores than available are rejected.
pub fn resolve_concurrency(requested: i64, available: usize) -> Result<usize> {
    let invalid = || KapsulError::InvalidCores {
        requested,
        available,
    };
    let requested_cores = usize::try_from(requested).map_err(|_| invalid())?;
    if requested_cores > available {
        return Err(invalid());
    }
    if requested_cores == 0 {
        return Ok(available.saturating_sub(1).max(1));
    }
    Ok(requested_cores)
}

/// Read a passphrase from a key file.
///
/// A single trailing newline (LF or CRLF) is stripped so `echo pass > file`
/// works. An empty file is an error rather than an empty passphrase.
pub fn load_key_file(path: &Path) -> Result<Zeroizing<String>> {
    let data = Zeroizing::new(fs::read(path).map_err(|e| {
        KapsulError::KeyFileError(format!("cannot read {}: {e}", path.display()))
    })?);

    let text = std::str::from_utf8(&data)
        .map_err(|_| KapsulError::KeyFileError(format!("{} is not UTF-8", path.display())))?;
    let text = text
        .strip_suffix('\n')
        .map(|t| t.strip_suffix('\r').unwrap_or(t))
        .unwrap_or(text);

    if text.is_empty() {
        return Err(KapsulError::KeyFileError(format!(
            "{} is empty",
            path.display()
        )));
    }

    Ok(Zeroizing::new(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KEY_LEN;
    use tempfile::TempDir;

    #[test]
    fn zero_cores_means_all_but_one() {
        assert_eq!(resolve_concurrency(0, 8).unwrap(), 7);
        assert_eq!(resolve_concurrency(0, 1).unwrap(), 1);
    }

    #[test]
    fn explicit_cores_within_range() {
        assert_eq!(resolve_concurrency(3, 8).unwrap(), 3);
        assert_eq!(resolve_concurrency(8, 8).unwrap(), 8);
    }

    #[test]
    fn out_of_range_cores_rejected() {
        assert!(resolve_concurrency(-1, 8).is_err());
        assert!(resolve_concurrency(9, 8).is_err());
    }

    #[test]
    fn second_secret_overwrites_first() {
        let mut ctx = Context::new(PathBuf::from("/"));
        ctx.set_secret(MasterKey::new([1; KEY_LEN]));
        ctx.set_secret(MasterKey::new([2; KEY_LEN]));
        assert_eq!(ctx.secret().unwrap().as_bytes(), &[2; KEY_LEN]);
    }

    #[test]
    fn key_file_strips_one_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("key");
        fs::write(&path, "hunter2\r\n").unwrap();
        assert_eq!(load_key_file(&path).unwrap().as_str(), "hunter2");

        fs::write(&path, "pass with spaces \n\n").unwrap();
        assert_eq!(
            load_key_file(&path).unwrap().as_str(),
            "pass with spaces \n"
        );
    }

    #[test]
    fn empty_key_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("key");
        fs::write(&path, "\n").unwrap();
        assert!(load_key_file(&path).is_err());
    }

    #[test]
    fn missing_key_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_key_file(&dir.path().join("nope")).is_err());
    }
}
