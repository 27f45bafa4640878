//! `kapsul digest`: SHA-256 of entry contents.
//!
//! One line per entry, BSD style:
//!
//!   SHA256 (docs/a.txt) = 9f86d08...

use clap::Parser;

use super::{parse_args, Subcommand};
use crate::context::Context;
use crate::errors::Result;
use crate::repository::{index, Repository};

#[derive(Parser, Debug, Default)]
#[command(name = "digest", about = "Print SHA-256 digests of entries")]
pub struct Digest {
    /// Entries to hash (default: all)
    paths: Vec<String>,
}

impl Subcommand for Digest {
    fn parse(&mut self, _ctx: &Context, args: &[String]) -> Result<()> {
        *self = parse_args("digest", args)?;
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut Context, repo: &mut Repository) -> Result<()> {
        for line in digests(repo, &self.paths)? {
            println!("{line}");
        }
        Ok(())
    }
}

fn digests(repo: &Repository, paths: &[String]) -> Result<Vec<String>> {
    let entries = if paths.is_empty() {
        repo.entries()?.iter().collect()
    } else {
        paths
            .iter()
            .map(|p| repo.entry(p))
            .collect::<Result<Vec<_>>>()?
    };

    entries
        .into_iter()
        .map(|e| {
            let data = repo.read(e)?;
            Ok(format!("SHA256 ({}) = {}", e.path, index::sha256_hex(&data)))
        })
        .collect()
}
