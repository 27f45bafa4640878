//! Command dispatch.
//!
//! `create` bootstraps a capsule that does not exist yet: no store is
//! opened, the builder subcommand receives `-o <location>` ahead of the
//! user's arguments. Every other command opens (and unlocks) the capsule
//! first, then is looked up, parsed and executed. The repository is closed
//! on every path once it was opened.

use std::collections::BTreeMap;

use super::commands::{
    archive::Archive, cat::Cat, check::Check, diff::Diff, digest::Digest, help::Help,
    locate::Locate, ls::Ls, ptar::Ptar, restore::Restore, server::Server, ui::Ui, Subcommand,
};
use crate::context::Context;
use crate::errors::{KapsulError, Result};
use crate::repository::{open_capsule, Repository};
use crate::storage::location_params;
use crate::unlock::{PassphrasePrompt, TerminalPrompt};

/// The command handled by the bootstrap path.
pub const CREATE_COMMAND: &str = "create";

/// Builds a fresh subcommand instance.
pub type Factory = Box<dyn Fn() -> Box<dyn Subcommand>>;

pub struct Dispatcher {
    commands: BTreeMap<&'static str, Factory>,
    bootstrap: Factory,
    prompt: Box<dyn PassphrasePrompt>,
}

impl Dispatcher {
    /// An empty registry. `bootstrap` serves `create`.
    pub fn new(prompt: Box<dyn PassphrasePrompt>, bootstrap: Factory) -> Self {
        Self {
            commands: BTreeMap::new(),
            bootstrap,
            prompt,
        }
    }

    /// Every built-in command, prompting on the terminal.
    pub fn with_defaults() -> Self {
        let mut d = Self::new(
            Box::new(TerminalPrompt),
            Box::new(|| -> Box<dyn Subcommand> {
                Box::new(Ptar::new(Box::new(TerminalPrompt)))
            }),
        );
        d.register("archive", || Box::new(Archive::default()));
        d.register("cat", || Box::new(Cat::default()));
        d.register("check", || Box::new(Check::default()));
        d.register("diff", || Box::new(Diff::default()));
        d.register("digest", || Box::new(Digest::default()));
        d.register("help", || Box::new(Help::default()));
        d.register("locate", || Box::new(Locate::default()));
        d.register("ls", || Box::new(Ls::default()));
        d.register("restore", || Box::new(Restore::default()));
        d.register("server", || Box::new(Server::default()));
        d.register("ui", || Box::new(Ui::default()));
        d
    }

    pub fn register<F>(&mut self, name: &'static str, factory: F)
    where
        F: Fn() -> Box<dyn Subcommand> + 'static,
    {
        self.commands.insert(name, Box::new(factory));
    }

    pub fn command_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.keys().copied()
    }

    /// Run `args[0]` with the remaining arguments.
    ///
    /// `location` is the capsule from `-f`. For `create` alone, a missing
    /// `-f` falls back to the first argument after the command.
    pub fn dispatch(
        &mut self,
        ctx: &mut Context,
        location: Option<&str>,
        args: &[String],
    ) -> Result<()> {
        let (name, rest) = args.split_first().ok_or(KapsulError::NoCommand)?;

        if name == CREATE_COMMAND {
            return self.bootstrap(ctx, location, rest);
        }

        let location = location.ok_or(KapsulError::NoLocation)?;
        let mut repo = open_capsule(ctx, location, self.prompt.as_mut())?;

        let result = self.run(ctx, &mut repo, name, rest);
        repo.close();
        result
    }

    fn run(
        &self,
        ctx: &mut Context,
        repo: &mut Repository,
        name: &str,
        args: &[String],
    ) -> Result<()> {
        let factory = self
            .commands
            .get(name)
            .ok_or_else(|| KapsulError::UnknownCommand(name.to_string()))?;

        let mut subcommand = factory();
        subcommand.parse(ctx, args)?;
        tracing::debug!(command = name, "executing");
        subcommand.execute(ctx, repo)
    }

    fn bootstrap(
        &mut self,
        ctx: &mut Context,
        location: Option<&str>,
        rest: &[String],
    ) -> Result<()> {
        let (location, rest) = match location {
            Some(location) => (location, rest),
            None => rest
                .split_first()
                .map(|(location, rest)| (location.as_str(), rest))
                .ok_or(KapsulError::NoLocation)?,
        };

        let mut repo = Repository::inexistent(&location_params(location))?;
        let mut subcommand = (self.bootstrap)();

        let result = subcommand
            .parse(ctx, &bootstrap_args(location, rest))
            .and_then(|()| subcommand.execute(ctx, &mut repo));
        repo.close();
        result
    }
}

/// Arguments for the bootstrap subcommand: `-o <location>` then the rest.
pub fn bootstrap_args(location: &str, rest: &[String]) -> Vec<String> {
    let mut args = Vec::with_capacity(rest.len() + 2);
    args.push("-o".to_string());
    args.push(location.to_string());
    args.extend_from_slice(rest);
    args
}
