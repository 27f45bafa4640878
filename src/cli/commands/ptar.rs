//! `kapsul create`: build a new capsule from files and directories.
//!
//! Reached only through the dispatcher's bootstrap path, which hands over
//! `-o <location>` followed by the user's arguments:
//!
//!   kapsul -f backup.ptar create ~/Documents ~/Pictures
//!   kapsul -f backup.ptar create --plaintext ./site
//!
//! The passphrase for an encrypted capsule comes from the same sources as
//! unlocking (key file, passphrase command, environment). When none is set
//! the user is asked for a new one, with confirmation.

use std::path::PathBuf;

use clap::Parser;
use zeroize::Zeroizing;

use super::{parse_args, Subcommand};
use crate::cli::output;
use crate::context::Context;
use crate::errors::{KapsulError, Result};
use crate::repository::writer::new_encryption;
use crate::repository::{CapsuleWriter, Repository};
use crate::storage::connectors::split_scheme;
use crate::storage::{self, Configuration};
use crate::unlock::{source_params, PassphrasePrompt, Resolver};

#[derive(Parser, Debug, Default)]
#[command(name = "create", about = "Create a new capsule from files and directories")]
struct PtarArgs {
    /// Where to write the capsule
    #[arg(short = 'o', value_name = "LOCATION")]
    output: String,

    /// Do not encrypt the capsule
    #[arg(long)]
    plaintext: bool,

    /// Files or directories to import
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,
}

/// Capsule builder behind `create`.
pub struct Ptar {
    args: PtarArgs,
    prompt: Box<dyn PassphrasePrompt>,
}

impl Ptar {
    pub fn new(prompt: Box<dyn PassphrasePrompt>) -> Self {
        Self {
            args: PtarArgs::default(),
            prompt,
        }
    }

    fn new_passphrase(&mut self, ctx: &Context) -> Result<Zeroizing<Vec<u8>>> {
        if let Some(candidate) = Resolver::default().resolve(ctx, &source_params(&ctx.settings))? {
            tracing::debug!(source = candidate.source(), "using configured passphrase");
            return Ok(Zeroizing::new(candidate.as_bytes().to_vec()));
        }
        let passphrase = self.prompt.read_new_passphrase("New capsule")?;
        Ok(Zeroizing::new(passphrase.as_bytes().to_vec()))
    }
}

impl Subcommand for Ptar {
    fn parse(&mut self, _ctx: &Context, args: &[String]) -> Result<()> {
        self.args = parse_args("create", args)?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut Context, repo: &mut Repository) -> Result<()> {
        if repo.exists() {
            return Err(KapsulError::CapsuleAlreadyExists(PathBuf::from(
                repo.location(),
            )));
        }
        let location = self.args.output.clone();

        let (config, key) = if self.args.plaintext {
            (Configuration::new(None), None)
        } else {
            let passphrase = self.new_passphrase(ctx)?;
            let (descriptor, key) = new_encryption(ctx.settings.argon2_params(), &passphrase)?;
            (Configuration::new(Some(descriptor)), Some(key))
        };
        let encrypted = config.is_encrypted();

        let mut writer = CapsuleWriter::new(config, key.clone())?;
        for path in &self.args.paths {
            let source = ctx.cwd.join(path);
            let added = writer.add_path(&source)?;
            tracing::info!(path = %source.display(), entries = added, "imported");
        }
        if writer.entry_count() == 0 {
            return Err(KapsulError::CommandFailed(
                "nothing to import (no regular files found)".into(),
            ));
        }

        let count = writer.entry_count();
        let bytes = writer.finish()?;
        storage::create(ctx, &storage::location_params(&location), &bytes)?;

        if let Some(key) = key {
            ctx.set_secret(key);
        }

        // A capsule streamed to stdout must not be followed by chatter.
        if split_scheme(&location).is_some_and(|(scheme, _)| scheme == "stdio") {
            return Ok(());
        }
        output::success(&format!(
            "Created {} ({count} entries{})",
            location,
            if encrypted { ", encrypted" } else { "" }
        ));
        if encrypted {
            output::tip("A lost passphrase cannot be recovered. Keep it somewhere safe.");
        }
        Ok(())
    }
}
