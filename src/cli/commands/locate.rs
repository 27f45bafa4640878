//! `kapsul locate`: find entries by name.
//!
//! Usage:
//!   kapsul -f backup.ptar locate invoice
//!   kapsul -f backup.ptar locate -i --regex '\.(jpe?g|png)$'

use clap::Parser;
use regex::RegexBuilder;

use super::{parse_args, Subcommand};
use crate::cli::output;
use crate::context::Context;
use crate::errors::{KapsulError, Result};
use crate::repository::Repository;

#[derive(Parser, Debug, Default)]
#[command(name = "locate", about = "Find entries by name or pattern")]
pub struct Locate {
    /// Case-insensitive matching
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// Treat PATTERN as a regular expression
    #[arg(long)]
    regex: bool,

    /// Substring (or regex) matched against full entry paths
    pattern: String,
}

impl Subcommand for Locate {
    fn parse(&mut self, _ctx: &Context, args: &[String]) -> Result<()> {
        *self = parse_args("locate", args)?;
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut Context, repo: &mut Repository) -> Result<()> {
        let is_match = self.matcher()?;
        let found: Vec<&str> = repo
            .entries()?
            .iter()
            .map(|e| e.path.as_str())
            .filter(|p| is_match(p))
            .collect();

        if found.is_empty() {
            output::info(&format!("No entries match '{}'", self.pattern));
        }
        for path in found {
            println!("{path}");
        }
        Ok(())
    }
}

impl Locate {
    fn matcher(&self) -> Result<Box<dyn Fn(&str) -> bool>> {
        if self.regex {
            let re = RegexBuilder::new(&self.pattern)
                .case_insensitive(self.ignore_case)
                .build()
                .map_err(|e| KapsulError::InvalidArguments {
                    command: "locate".into(),
                    message: e.to_string(),
                })?;
            return Ok(Box::new(move |p| re.is_match(p)));
        }

        if self.ignore_case {
            let needle = self.pattern.to_lowercase();
            Ok(Box::new(move |p| p.to_lowercase().contains(&needle)))
        } else {
            let needle = self.pattern.clone();
            Ok(Box::new(move |p| p.contains(&needle)))
        }
    }
}
