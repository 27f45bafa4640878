//! `kapsul help`: list commands.

use clap::Parser;
use console::style;

use super::{parse_args, Subcommand, COMMANDS};
use crate::context::Context;
use crate::errors::{KapsulError, Result};
use crate::repository::Repository;

#[derive(Parser, Debug, Default)]
#[command(name = "help", about = "List available commands")]
pub struct Help {
    /// Show the description of a single command
    command: Option<String>,
}

impl Subcommand for Help {
    fn parse(&mut self, _ctx: &Context, args: &[String]) -> Result<()> {
        *self = parse_args("help", args)?;
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut Context, _repo: &mut Repository) -> Result<()> {
        match self.command {
            Some(ref name) => {
                let (name, about) = COMMANDS
                    .iter()
                    .find(|(n, _)| *n == name.as_str())
                    .ok_or_else(|| KapsulError::UnknownCommand(name.clone()))?;
                println!("{}  {about}", style(name).bold());
                println!("Run `kapsul -f <CAPSULE> {name} --help` for its options.");
            }
            None => {
                println!("{}", style("Commands:").bold().underlined());
                for (name, about) in COMMANDS {
                    println!("  {:<9} {about}", style(name).cyan());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::fixtures::plaintext_repo;

    #[test]
    fn unknown_topic() {
        let (_dir, mut ctx, mut repo) = plaintext_repo(&[]);
        let mut help = Help::default();
        help.parse(&ctx, &["frobnicate".into()]).unwrap();
        let err = help.execute(&mut ctx, &mut repo).unwrap_err();
        assert!(matches!(err, KapsulError::UnknownCommand(_)));
    }

    #[test]
    fn known_topic() {
        let (_dir, mut ctx, mut repo) = plaintext_repo(&[]);
        let mut help = Help::default();
        help.parse(&ctx, &["ls".into()]).unwrap();
        assert!(help.execute(&mut ctx, &mut repo).is_ok());
    }
}
