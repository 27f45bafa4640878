//! Transport connectors: where capsule bytes come from and go to.
//!
//! The location scheme picks the connector:
//!
//! | location                          | connector            |
//! |-----------------------------------|----------------------|
//! | `/path`, `fs:///path`, `ptar:///path` | local file       |
//! | `ptar+http://…`, `ptar+https://…` | HTTP (read-only)     |
//! | `stdio://`                        | stdin / stdout       |
//! | `sftp://…`, anything else         | unsupported          |

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::errors::{KapsulError, Result};

/// Moves a whole serialized capsule in or out of some medium.
pub trait Connector: Send + Sync {
    /// Short scheme name, for diagnostics.
    fn scheme(&self) -> &'static str;

    /// The location as the connector understands it.
    fn location(&self) -> String;

    /// Read the serialized capsule.
    fn load(&self) -> Result<Vec<u8>>;

    /// Write a brand-new serialized capsule. Never overwrites.
    fn save(&self, bytes: &[u8]) -> Result<()>;
}

/// Split `scheme://rest`. Bare paths have no scheme.
pub fn split_scheme(location: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = location.split_once("://")?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.');
    valid.then_some((scheme, rest))
}

/// Build the connector for `location`, resolving relative paths against `cwd`.
pub fn connector_for(location: &str, cwd: &Path) -> Result<Box<dyn Connector>> {
    match split_scheme(location) {
        None => Ok(Box::new(FsConnector::new(cwd.join(location)))),
        Some(("fs" | "ptar", path)) => Ok(Box::new(FsConnector::new(cwd.join(path)))),
        Some(("ptar+http" | "ptar+https", _)) => http_connector(location),
        Some(("stdio", _)) => Ok(Box::new(StdioConnector)),
        Some((scheme, _)) => Err(KapsulError::UnsupportedTransport(scheme.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Local file
// ---------------------------------------------------------------------------

/// A capsule stored as a single local file.
pub struct FsConnector {
    path: PathBuf,
}

impl FsConnector {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Connector for FsConnector {
    fn scheme(&self) -> &'static str {
        "fs"
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Vec<u8>> {
        if !self.path.exists() {
            return Err(KapsulError::CapsuleNotFound(self.location()));
        }
        Ok(fs::read(&self.path)?)
    }

    /// Write atomically: temp file in the same directory, then rename.
    fn save(&self, bytes: &[u8]) -> Result<()> {
        if self.path.exists() {
            return Err(KapsulError::CapsuleAlreadyExists(self.path.clone()));
        }

        let parent = self.path.parent().unwrap_or(Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy()
        ));

        fs::write(&tmp_path, bytes)?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Standard streams
// ---------------------------------------------------------------------------

/// Reads a capsule from stdin, writes a new one to stdout.
pub struct StdioConnector;

impl Connector for StdioConnector {
    fn scheme(&self) -> &'static str {
        "stdio"
    }

    fn location(&self) -> String {
        "stdio://".to_string()
    }

    fn load(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        std::io::stdin().lock().read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn save(&self, bytes: &[u8]) -> Result<()> {
        let mut out = std::io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HTTP (archive served over plain HTTP/HTTPS)
// ---------------------------------------------------------------------------

/// Upper bound on a downloaded capsule (1 GiB).
#[cfg(feature = "http")]
const MAX_HTTP_CAPSULE: u64 = 1 << 30;

#[cfg(feature = "http")]
fn http_connector(location: &str) -> Result<Box<dyn Connector>> {
    let url = location.trim_start_matches("ptar+").to_string();
    Ok(Box::new(HttpConnector { url }))
}

#[cfg(not(feature = "http"))]
fn http_connector(location: &str) -> Result<Box<dyn Connector>> {
    let _ = location;
    Err(KapsulError::Unsupported(
        "HTTP transport (rebuild with `cargo build --features http`)".into(),
    ))
}

/// Fetches a capsule with a single GET. Read-only.
#[cfg(feature = "http")]
pub struct HttpConnector {
    url: String,
}

#[cfg(feature = "http")]
impl Connector for HttpConnector {
    fn scheme(&self) -> &'static str {
        "ptar+http"
    }

    fn location(&self) -> String {
        self.url.clone()
    }

    fn load(&self) -> Result<Vec<u8>> {
        let fail = |cause: String| KapsulError::StoreOpen {
            location: self.url.clone(),
            cause,
        };

        let mut response = ureq::get(&self.url)
            .header("User-Agent", &format!("kapsul/{}", env!("CARGO_PKG_VERSION")))
            .call()
            .map_err(|e| fail(e.to_string()))?;

        response
            .body_mut()
            .with_config()
            .limit(MAX_HTTP_CAPSULE)
            .read_to_vec()
            .map_err(|e| fail(e.to_string()))
    }

    fn save(&self, _bytes: &[u8]) -> Result<()> {
        Err(KapsulError::Unsupported(format!(
            "writing a capsule to {}",
            self.url
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn split_scheme_cases() {
        assert_eq!(split_scheme("/tmp/x.ptar"), None);
        assert_eq!(split_scheme("fs:///tmp/x"), Some(("fs", "/tmp/x")));
        assert_eq!(
            split_scheme("ptar+https://host/p"),
            Some(("ptar+https", "host/p"))
        );
        assert_eq!(split_scheme("://nothing"), None);
    }

    #[test]
    fn bare_path_is_local_file_relative_to_cwd() {
        let connector = connector_for("caps/x.ptar", Path::new("/work")).unwrap();
        assert_eq!(connector.scheme(), "fs");
        assert_eq!(
            connector.location(),
            Path::new("/work/caps/x.ptar").display().to_string()
        );
    }

    #[test]
    fn sftp_is_unsupported() {
        let result = connector_for("sftp://host/x", Path::new("/"));
        assert!(matches!(result, Err(KapsulError::UnsupportedTransport(s)) if s == "sftp"));
    }

    #[test]
    fn fs_save_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let connector = FsConnector::new(dir.path().join("c.ptar"));
        connector.save(b"first").unwrap();
        assert!(matches!(
            connector.save(b"second"),
            Err(KapsulError::CapsuleAlreadyExists(_))
        ));
        assert_eq!(connector.load().unwrap(), b"first");
    }

    #[test]
    fn fs_load_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let connector = FsConnector::new(dir.path().join("missing.ptar"));
        assert!(matches!(
            connector.load(),
            Err(KapsulError::CapsuleNotFound(_))
        ));
    }
}
