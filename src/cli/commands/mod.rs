//! Subcommands.
//!
//! Every command is parsed from its own argument list (after the capsule
//! is open) and then executed against the repository. `create` is the one
//! exception: it goes through the bootstrap path in the dispatcher and is
//! implemented by `ptar`.

pub mod archive;
pub mod cat;
pub mod check;
pub mod diff;
pub mod digest;
pub mod help;
pub mod locate;
pub mod ls;
pub mod ptar;
pub mod restore;
pub mod server;
pub mod ui;

use clap::error::ErrorKind;
use clap::Parser;

use crate::context::Context;
use crate::errors::{KapsulError, Result};
use crate::repository::Repository;

/// A command runnable against a capsule.
pub trait Subcommand {
    /// Parse the arguments following the command name.
    fn parse(&mut self, ctx: &Context, args: &[String]) -> Result<()>;

    /// Run against the repository. Only called after a successful `parse`.
    fn execute(&mut self, ctx: &mut Context, repo: &mut Repository) -> Result<()>;
}

/// Name and one-line description of every command.
pub const COMMANDS: &[(&str, &str)] = &[
    ("archive", "Export entries as a tar archive"),
    ("cat", "Print entry contents"),
    ("check", "Verify capsule integrity"),
    ("create", "Create a new capsule from files and directories"),
    ("diff", "Show line differences between two entries"),
    ("digest", "Print SHA-256 digests of entries"),
    ("help", "List available commands"),
    ("locate", "Find entries by name or pattern"),
    ("ls", "List entries"),
    ("restore", "Extract entries to disk"),
    ("server", "Serve the capsule over HTTP"),
    ("ui", "Browse the capsule in a web interface"),
];

/// Command list shown after `--help`.
pub const COMMANDS_HELP: &str = "\
Commands:
  archive   Export entries as a tar archive
  cat       Print entry contents
  check     Verify capsule integrity
  create    Create a new capsule from files and directories
  diff      Show line differences between two entries
  digest    Print SHA-256 digests of entries
  help      List available commands
  locate    Find entries by name or pattern
  ls        List entries
  restore   Extract entries to disk
  server    Serve the capsule over HTTP
  ui        Browse the capsule in a web interface

Examples:
  kapsul -f backup.ptar create ~/Documents
  kapsul -f backup.ptar ls
  kapsul -f https://example.com/backup.ptar cat notes/todo.txt";

/// Parse a command's arguments with clap, mapping failures to kapsul errors.
pub fn parse_args<T: Parser>(command: &str, args: &[String]) -> Result<T> {
    let argv = std::iter::once(command.to_string()).chain(args.iter().cloned());
    T::try_parse_from(argv).map_err(|e| match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            KapsulError::HelpRequested(e.to_string())
        }
        _ => KapsulError::InvalidArguments {
            command: command.to_string(),
            message: e
                .to_string()
                .trim_start_matches("error: ")
                .trim_end()
                .to_string(),
        },
    })
}
