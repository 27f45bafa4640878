//! CLI module: global flags, output helpers, dispatcher and subcommands.

pub mod commands;
pub mod dispatch;
pub mod output;

use std::path::PathBuf;

use clap::{CommandFactory, Parser};

use crate::config::Settings;
use crate::context::{load_key_file, resolve_concurrency, Context};
use crate::errors::Result;

/// kapsul: open, inspect and create capsules.
#[derive(Parser, Debug)]
#[command(
    name = "kapsul",
    about = "Open, inspect and create content-addressed capsules",
    version,
    override_usage = "kapsul [OPTIONS] -f <CAPSULE> <COMMAND> [ARGS]...",
    after_help = commands::COMMANDS_HELP
)]
pub struct Cli {
    /// Path or URL of the capsule
    #[arg(short = 'f', long = "file", env = "KAPSUL_FILE")]
    pub file: Option<String>,

    /// Number of cores to use (default: all available cores -1)
    #[arg(short = 'c', long, default_value_t = 0, allow_negative_numbers = true)]
    pub cores: i64,

    /// Read the capsule passphrase from this file
    #[arg(long)]
    pub keyfile: Option<PathBuf>,

    /// Shell command printing the passphrase on one line (overrides .kapsul.toml)
    #[arg(long)]
    pub passphrase_cmd: Option<String>,

    /// More log output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Command and its arguments
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    pub args: Vec<String>,
}

/// Full usage text, for unknown or missing commands.
pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

/// Build the execution context from the global flags.
///
/// Settings come from `.kapsul.toml` in the working directory, with
/// `--passphrase-cmd` taking precedence over the file.
pub fn build_context(cli: &Cli) -> Result<Context> {
    let cwd = std::env::current_dir()?;
    let mut ctx = Context::new(cwd);

    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    ctx.max_concurrency = resolve_concurrency(cli.cores, available)?;

    ctx.settings = Settings::load(&ctx.cwd)?;
    if let Some(ref cmd) = cli.passphrase_cmd {
        ctx.settings.passphrase_cmd = Some(cmd.clone());
    }

    if let Some(ref path) = cli.keyfile {
        ctx.set_key_from_file(load_key_file(&ctx.cwd.join(path))?);
    }

    tracing::debug!(
        cwd = %ctx.cwd.display(),
        max_concurrency = ctx.max_concurrency,
        "context ready"
    );
    Ok(ctx)
}
