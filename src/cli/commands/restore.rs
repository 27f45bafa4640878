//! `kapsul restore`: extract entries to disk.
//!
//! Usage:
//!   kapsul -f backup.ptar restore --to /tmp/out
//!   kapsul -f backup.ptar restore --force docs
//!
//! Existing files are left alone unless `--force` is given; the check
//! happens for every target before anything is written.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use clap::Parser;

use super::{parse_args, Subcommand};
use crate::cli::output;
use crate::context::Context;
use crate::errors::{KapsulError, Result};
use crate::repository::{Entry, Repository};

#[derive(Parser, Debug, Default)]
#[command(name = "restore", about = "Extract entries to disk")]
pub struct Restore {
    /// Destination directory (default: current directory)
    #[arg(long, value_name = "DIR")]
    to: Option<PathBuf>,

    /// Overwrite existing files
    #[arg(long)]
    force: bool,

    /// Only restore entries under this path
    prefix: Option<String>,
}

impl Subcommand for Restore {
    fn parse(&mut self, _ctx: &Context, args: &[String]) -> Result<()> {
        *self = parse_args("restore", args)?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut Context, repo: &mut Repository) -> Result<()> {
        let target = match self.to {
            Some(ref dir) => ctx.cwd.join(dir),
            None => ctx.cwd.clone(),
        };
        let entries = repo.entries_under(self.prefix.as_deref().unwrap_or(""))?;

        let plan = entries
            .into_iter()
            .map(|e| safe_join(&target, &e.path).map(|dest| (e, dest)))
            .collect::<Result<Vec<_>>>()?;

        if !self.force {
            if let Some((_, dest)) = plan.iter().find(|(_, dest)| dest.exists()) {
                return Err(KapsulError::CommandFailed(format!(
                    "{} already exists (use --force to overwrite)",
                    dest.display()
                )));
            }
        }

        for (entry, dest) in &plan {
            restore_entry(repo, entry, dest)?;
        }

        output::success(&format!(
            "Restored {} entries to {}",
            plan.len(),
            target.display()
        ));
        Ok(())
    }
}

/// Join an entry path under `root`, refusing anything that could escape it.
fn safe_join(root: &Path, entry_path: &str) -> Result<PathBuf> {
    let mut dest = root.to_path_buf();
    for part in entry_path.split('/') {
        if part.is_empty() || part == "." || part == ".." || part.contains(['\\', ':']) {
            return Err(KapsulError::InvalidCapsule(format!(
                "unsafe entry path '{entry_path}'"
            )));
        }
        dest.push(part);
    }
    Ok(dest)
}

fn restore_entry(repo: &Repository, entry: &Entry, dest: &Path) -> Result<()> {
    let data = repo.read(entry)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = File::create(dest)?;
    file.write_all(&data)?;
    file.set_modified(SystemTime::from(entry.modified))?;
    drop(file);

    set_mode(dest, entry.mode)?;
    tracing::debug!(path = %entry.path, dest = %dest.display(), "restored");
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if mode & 0o777 != 0 {
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::fixtures::plaintext_repo;

    #[test]
    fn safe_join_rejects_escapes() {
        let root = Path::new("/out");
        assert_eq!(safe_join(root, "a/b.txt").unwrap(), Path::new("/out/a/b.txt"));
        assert!(safe_join(root, "../etc/passwd").is_err());
        assert!(safe_join(root, "/etc/passwd").is_err());
        assert!(safe_join(root, "a/./b").is_err());
        assert!(safe_join(root, "c:\\x").is_err());
    }

    #[test]
    fn restores_under_target() {
        let (dir, mut ctx, mut repo) =
            plaintext_repo(&[("docs/a.txt", b"alpha"), ("docs/sub/b.txt", b"beta"), ("z", b"z")]);

        let mut cmd = Restore::default();
        cmd.parse(&ctx, &["--to".into(), "out".into(), "docs".into()])
            .unwrap();
        cmd.execute(&mut ctx, &mut repo).unwrap();

        let out = dir.path().join("out");
        assert_eq!(fs::read(out.join("docs/a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(out.join("docs/sub/b.txt")).unwrap(), b"beta");
        assert!(!out.join("z").exists());
    }

    #[test]
    fn existing_files_need_force() {
        let (dir, mut ctx, mut repo) = plaintext_repo(&[("a.txt", b"new")]);
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("a.txt"), b"old").unwrap();

        let mut cmd = Restore::default();
        cmd.parse(&ctx, &["--to".into(), "out".into()]).unwrap();
        assert!(cmd.execute(&mut ctx, &mut repo).is_err());
        assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"old");

        let mut cmd = Restore::default();
        cmd.parse(&ctx, &["--to".into(), "out".into(), "--force".into()])
            .unwrap();
        cmd.execute(&mut ctx, &mut repo).unwrap();
        assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"new");
    }
}
