//! Interactive passphrase entry.

use zeroize::Zeroizing;

use crate::cli::output;
use crate::errors::{KapsulError, Result};

/// Minimum length for a passphrase chosen interactively.
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// Something that can ask a human for a passphrase.
pub trait PassphrasePrompt {
    /// Ask once for an existing passphrase.
    fn read_passphrase(&mut self, label: &str) -> Result<Zeroizing<String>>;

    /// Ask for a new passphrase, with confirmation.
    fn read_new_passphrase(&mut self, label: &str) -> Result<Zeroizing<String>>;
}

/// Prompts on the controlling terminal, input hidden.
pub struct TerminalPrompt;

impl PassphrasePrompt for TerminalPrompt {
    fn read_passphrase(&mut self, label: &str) -> Result<Zeroizing<String>> {
        let pw = dialoguer::Password::new()
            .with_prompt(format!("{label} passphrase"))
            .allow_empty_password(true)
            .interact()
            .map_err(|e| KapsulError::PromptFailed(e.to_string()))?;
        Ok(Zeroizing::new(pw))
    }

    fn read_new_passphrase(&mut self, label: &str) -> Result<Zeroizing<String>> {
        loop {
            let pw = dialoguer::Password::new()
                .with_prompt(format!("{label} passphrase"))
                .with_confirmation(
                    format!("{label} passphrase (confirm)"),
                    "Passphrases do not match, try again",
                )
                .interact()
                .map_err(|e| KapsulError::PromptFailed(e.to_string()))?;

            if pw.len() < MIN_PASSPHRASE_LEN {
                output::warning(&format!(
                    "Passphrase must be at least {MIN_PASSPHRASE_LEN} characters. Try again."
                ));
                continue;
            }

            return Ok(Zeroizing::new(pw));
        }
    }
}
