//! `kapsul check`: verify capsule integrity.
//!
//! The container trailer is always checked. Without `--fast`, every entry
//! is also read back, decrypted and matched against its address, spread
//! across `max_concurrency` workers.

use clap::Parser;

use super::{parse_args, Subcommand};
use crate::cli::output;
use crate::context::Context;
use crate::errors::{KapsulError, Result};
use crate::repository::{Entry, Repository};

#[derive(Parser, Debug, Default)]
#[command(name = "check", about = "Verify capsule integrity")]
pub struct Check {
    /// Only verify the container trailer
    #[arg(long)]
    fast: bool,

    /// Only verify entries under this path
    prefix: Option<String>,
}

impl Subcommand for Check {
    fn parse(&mut self, _ctx: &Context, args: &[String]) -> Result<()> {
        *self = parse_args("check", args)?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut Context, repo: &mut Repository) -> Result<()> {
        repo.verify_trailer()?;
        if self.fast {
            output::success("Capsule trailer OK");
            return Ok(());
        }

        let entries = repo.entries_under(self.prefix.as_deref().unwrap_or(""))?;
        let failures = verify_entries(repo, &entries, ctx.max_concurrency);

        for (path, err) in &failures {
            output::error(&format!("{path}: {err}"));
        }
        if !failures.is_empty() {
            return Err(KapsulError::CommandFailed(format!(
                "{} of {} entries failed verification",
                failures.len(),
                entries.len()
            )));
        }

        output::success(&format!(
            "{} entries verified ({} distinct blobs)",
            entries.len(),
            repo.blob_count()?
        ));
        Ok(())
    }
}

/// Read back every entry on up to `workers` threads.
///
/// Returns `(path, error)` for each entry that failed, sorted by path.
pub fn verify_entries(
    repo: &Repository,
    entries: &[&Entry],
    workers: usize,
) -> Vec<(String, String)> {
    if entries.is_empty() {
        return Vec::new();
    }
    let chunk = entries.len().div_ceil(workers.max(1));

    let mut failures: Vec<(String, String)> = std::thread::scope(|s| {
        let handles: Vec<_> = entries
            .chunks(chunk)
            .map(|part| {
                s.spawn(move || {
                    part.iter()
                        .filter_map(|e| {
                            repo.read(e).err().map(|err| (e.path.clone(), err.to_string()))
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|h| {
                h.join().unwrap_or_else(|_| {
                    vec![("<worker>".to_string(), "verification worker panicked".to_string())]
                })
            })
            .collect()
    });

    tracing::debug!(
        entries = entries.len(),
        workers,
        failed = failures.len(),
        "entries verified"
    );
    failures.sort();
    failures
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::cli::commands::fixtures::{plaintext_repo, NoPrompt};
    use crate::repository::{index, open_capsule, Index};
    use crate::storage::{format, Configuration};

    #[test]
    fn clean_capsule_verifies_on_many_workers() {
        let files: Vec<(String, Vec<u8>)> = (0..10)
            .map(|i| (format!("f{i}"), format!("contents {i}").into_bytes()))
            .collect();
        let refs: Vec<(&str, &[u8])> = files
            .iter()
            .map(|(p, d)| (p.as_str(), d.as_slice()))
            .collect();
        let (_dir, _ctx, repo) = plaintext_repo(&refs);

        let entries = repo.entries_under("").unwrap();
        assert!(verify_entries(&repo, &entries, 3).is_empty());
        assert!(verify_entries(&repo, &entries, 64).is_empty());
    }

    #[test]
    fn swapped_blob_is_reported() {
        let good = b"original".to_vec();
        let address = index::content_address(None, &good).unwrap();

        let mut idx = Index::default();
        idx.entries.push(index::Entry {
            path: "doc.txt".into(),
            address: address.clone(),
            size: good.len() as u64,
            mode: 0o644,
            modified: Utc::now(),
        });
        idx.blobs.insert(address, index::seal(None, b"replaced").unwrap());

        let bytes = format::build_capsule(
            &Configuration::new(None).to_bytes().unwrap(),
            &idx.to_bytes().unwrap(),
            None,
        )
        .unwrap();

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.ptar"), bytes).unwrap();
        let mut ctx = Context::new(dir.path().to_path_buf());
        let mut repo = open_capsule(&mut ctx, "bad.ptar", &mut NoPrompt).unwrap();

        let entries = repo.entries_under("").unwrap();
        let failures = verify_entries(&repo, &entries, 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "doc.txt");

        let mut cmd = Check::default();
        cmd.parse(&ctx, &[]).unwrap();
        assert!(cmd.execute(&mut ctx, &mut repo).is_err());

        let mut fast = Check::default();
        fast.parse(&ctx, &["--fast".into()]).unwrap();
        assert!(fast.execute(&mut ctx, &mut repo).is_ok());
    }
}
