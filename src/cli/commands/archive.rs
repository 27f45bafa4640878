//! `kapsul archive`: export entries as a tar stream.
//!
//! Usage:
//!   kapsul -f backup.ptar archive -o backup.tar
//!   kapsul -f backup.ptar archive docs > docs.tar

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;

use super::{parse_args, Subcommand};
use crate::cli::output;
use crate::context::Context;
use crate::errors::{KapsulError, Result};
use crate::repository::{Entry, Repository};

#[derive(Parser, Debug, Default)]
#[command(name = "archive", about = "Export entries as a tar archive")]
pub struct Archive {
    /// Output file (default: stdout). Never overwritten.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only export entries under this path
    prefix: Option<String>,
}

impl Subcommand for Archive {
    fn parse(&mut self, _ctx: &Context, args: &[String]) -> Result<()> {
        *self = parse_args("archive", args)?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut Context, repo: &mut Repository) -> Result<()> {
        let entries = repo.entries_under(self.prefix.as_deref().unwrap_or(""))?;

        match self.output {
            Some(ref path) => {
                let path = ctx.cwd.join(path);
                let file = OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .map_err(|e| match e.kind() {
                        io::ErrorKind::AlreadyExists => KapsulError::CommandFailed(format!(
                            "{} already exists",
                            path.display()
                        )),
                        _ => e.into(),
                    })?;
                write_tar(repo, &entries, file)?;
                output::success(&format!(
                    "Archived {} entries to {}",
                    entries.len(),
                    path.display()
                ));
            }
            None => {
                write_tar(repo, &entries, io::stdout().lock())?;
            }
        }
        Ok(())
    }
}

/// Write `entries` as a tar stream into `writer` and return it.
pub fn write_tar<W: Write>(repo: &Repository, entries: &[&Entry], writer: W) -> Result<W> {
    let mut builder = tar::Builder::new(writer);

    for entry in entries {
        let data = repo.read(entry)?;
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(entry.mode);
        header.set_mtime(entry.modified.timestamp().max(0) as u64);
        builder.append_data(&mut header, &entry.path, data.as_slice())?;
    }

    let mut writer = builder.into_inner()?;
    writer.flush()?;
    Ok(writer)
}
