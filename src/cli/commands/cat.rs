//! `kapsul cat`: print entry contents.

use std::io::{self, Write};

use clap::Parser;

use super::{parse_args, Subcommand};
use crate::context::Context;
use crate::errors::Result;
use crate::repository::Repository;

#[derive(Parser, Debug, Default)]
#[command(name = "cat", about = "Print entry contents")]
pub struct Cat {
    /// Entries to print, in order
    #[arg(required = true)]
    paths: Vec<String>,
}

impl Subcommand for Cat {
    fn parse(&mut self, _ctx: &Context, args: &[String]) -> Result<()> {
        *self = parse_args("cat", args)?;
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut Context, repo: &mut Repository) -> Result<()> {
        write_entries(repo, &self.paths, &mut io::stdout().lock())
    }
}

fn write_entries(repo: &Repository, paths: &[String], out: &mut impl Write) -> Result<()> {
    for path in paths {
        let entry = repo.entry(path)?;
        out.write_all(&repo.read(entry)?)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::fixtures::plaintext_repo;
    use crate::errors::KapsulError;

    #[test]
    fn concatenates_in_argument_order() {
        let (_dir, _ctx, repo) = plaintext_repo(&[("a", b"first\n"), ("b", b"second\n")]);
        let mut out = Vec::new();
        write_entries(&repo, &["b".into(), "a".into()], &mut out).unwrap();
        assert_eq!(out, b"second\nfirst\n");
    }

    #[test]
    fn missing_entry() {
        let (_dir, _ctx, repo) = plaintext_repo(&[("a", b"x")]);
        let err = write_entries(&repo, &["nope".into()], &mut Vec::new()).unwrap_err();
        assert!(matches!(err, KapsulError::EntryNotFound(_)));
    }

    #[test]
    fn requires_a_path() {
        let (_dir, ctx, _repo) = plaintext_repo(&[]);
        assert!(Cat::default().parse(&ctx, &[]).is_err());
    }
}
