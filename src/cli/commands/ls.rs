//! `kapsul ls`: list entries in a table.

use clap::Parser;

use super::{parse_args, Subcommand};
use crate::cli::output;
use crate::context::Context;
use crate::errors::Result;
use crate::repository::Repository;

#[derive(Parser, Debug, Default)]
#[command(name = "ls", about = "List entries")]
pub struct Ls {
    /// Print bare paths, one per line
    #[arg(short = 'p', long = "paths-only")]
    paths_only: bool,

    /// Only list entries under this path
    prefix: Option<String>,
}

impl Subcommand for Ls {
    fn parse(&mut self, _ctx: &Context, args: &[String]) -> Result<()> {
        *self = parse_args("ls", args)?;
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut Context, repo: &mut Repository) -> Result<()> {
        let entries = repo.entries_under(self.prefix.as_deref().unwrap_or(""))?;

        if self.paths_only {
            for e in &entries {
                println!("{}", e.path);
            }
            return Ok(());
        }

        let total: u64 = entries.iter().map(|e| e.size).sum();
        let config = repo.configuration()?;
        output::info(&format!(
            "{} ({}, created {}): {} entries, {}{}",
            repo.location(),
            repo.transport().unwrap_or("none"),
            config.created_at.format("%Y-%m-%d"),
            entries.len(),
            output::format_size(total),
            if repo.is_encrypted() { ", encrypted" } else { "" }
        ));
        output::print_entries_table(&entries);
        Ok(())
    }
}
