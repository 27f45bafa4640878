//! Repository unlock: turn some passphrase into a verified capsule key.
//!
//! Two phases:
//!
//! - **non-interactive**: run the resolver once. A candidate that fails the
//!   canary is fatal right away. A wrong secret in a key file, parameter,
//!   command or environment variable is a configuration error, not a typo.
//! - **interactive**: only when no source produced anything. Up to
//!   `PROMPT_ATTEMPTS` prompts, each derived and verified on its own.
//!
//! A configuration without encryption is a no-op.

pub mod prompt;
pub mod sources;

use crate::cli::output;
use crate::context::Context;
use crate::crypto::{derive_key, verify_canary};
use crate::errors::{KapsulError, Result};
use crate::storage::Configuration;

pub use prompt::{PassphrasePrompt, TerminalPrompt};
pub use sources::{source_params, Candidate, PassphraseSource, Resolver, SourceParams};

/// Interactive attempts before giving up.
pub const PROMPT_ATTEMPTS: usize = 3;

/// Sequences passphrase resolution and key verification.
pub struct Unlocker {
    resolver: Resolver,
    attempts: usize,
}

impl Default for Unlocker {
    fn default() -> Self {
        Self::new(Resolver::default())
    }
}

impl Unlocker {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            attempts: PROMPT_ATTEMPTS,
        }
    }

    /// Unlock `config` and attach the verified key to `ctx`.
    ///
    /// Returns `CantUnlock` on a rejected non-interactive secret or after
    /// the interactive attempts run out. Source and KDF failures propagate
    /// as they are.
    pub fn unlock(
        &self,
        ctx: &mut Context,
        config: &Configuration,
        params: &SourceParams,
        prompt: &mut dyn PassphrasePrompt,
    ) -> Result<()> {
        let Some(descriptor) = config.encryption.as_ref() else {
            return Ok(());
        };

        if let Some(candidate) = self.resolver.resolve(ctx, params)? {
            let key = derive_key(&descriptor.kdf, candidate.as_bytes())?;
            if !verify_canary(descriptor, &key) {
                tracing::warn!(source = candidate.source(), "passphrase rejected");
                return Err(KapsulError::CantUnlock);
            }
            ctx.set_secret(key);
            return Ok(());
        }

        for attempt in 1..=self.attempts {
            let passphrase = prompt.read_passphrase("repository")?;
            let key = derive_key(&descriptor.kdf, passphrase.as_bytes())?;
            if verify_canary(descriptor, &key) {
                ctx.set_secret(key);
                return Ok(());
            }
            tracing::debug!(attempt, "interactive passphrase rejected");
            if attempt < self.attempts {
                output::warning("Incorrect passphrase, try again.");
            }
        }

        Err(KapsulError::CantUnlock)
    }
}
