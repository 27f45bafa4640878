//! Opening an existing capsule.
//!
//! 1. normalize the location (bare `http(s)://` URLs go through the
//!    archive transport)
//! 2. open the store
//! 3. decode the configuration envelope
//! 4. strict version gate
//! 5. unlock, if the configuration declares encryption
//! 6. build the repository handle
//!
//! Nothing is retried across steps; only step 5 retries, internally.

use std::borrow::Cow;

use super::Repository;
use crate::context::Context;
use crate::errors::Result;
use crate::storage::{self, Configuration};
use crate::unlock::{source_params, PassphrasePrompt, Unlocker};

/// Scheme prefix routing a URL through the archive-over-HTTP transport.
pub const ARCHIVE_TRANSPORT_PREFIX: &str = "ptar+";

/// Rewrite a bare `http://` / `https://` URL to the archive transport.
/// Everything else passes through unchanged.
pub fn normalize_location(location: &str) -> Cow<'_, str> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Cow::Owned(format!("{ARCHIVE_TRANSPORT_PREFIX}{location}"))
    } else {
        Cow::Borrowed(location)
    }
}

/// Open the capsule at `location` with the standard unlock sequence.
pub fn open_capsule(
    ctx: &mut Context,
    location: &str,
    prompt: &mut dyn PassphrasePrompt,
) -> Result<Repository> {
    open_capsule_with(ctx, location, &Unlocker::default(), prompt)
}

/// Same as `open_capsule` with a caller-supplied unlocker.
pub fn open_capsule_with(
    ctx: &mut Context,
    location: &str,
    unlocker: &Unlocker,
    prompt: &mut dyn PassphrasePrompt,
) -> Result<Repository> {
    let location = normalize_location(location);

    let (store, serialized_config) = storage::open(ctx, &storage::location_params(&location))?;

    let config = Configuration::from_bytes(&serialized_config)?;
    config.check_version()?;

    let params = source_params(&ctx.settings);
    unlocker.unlock(ctx, &config, &params, prompt)?;

    let repo = Repository::new(ctx.secret(), store, &serialized_config)?;
    tracing::debug!(
        location = repo.location(),
        encrypted = repo.is_encrypted(),
        "capsule opened"
    );
    Ok(repo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_urls_go_through_archive_transport() {
        assert_eq!(
            normalize_location("https://host/path"),
            "ptar+https://host/path"
        );
        assert_eq!(
            normalize_location("http://host/a.ptar"),
            "ptar+http://host/a.ptar"
        );
    }

    #[test]
    fn other_locations_pass_through() {
        assert!(matches!(
            normalize_location("/local/path"),
            Cow::Borrowed("/local/path")
        ));
        assert_eq!(normalize_location("sftp://host/x"), "sftp://host/x");
        assert_eq!(
            normalize_location("ptar+https://host/x"),
            "ptar+https://host/x"
        );
    }
}
