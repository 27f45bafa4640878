//! `kapsul diff`: line differences between two entries.
//!
//! Usage:
//!   kapsul -f backup.ptar diff etc/hosts etc/hosts.old

use clap::Parser;
use console::style;

use super::{parse_args, Subcommand};
use crate::cli::output;
use crate::context::Context;
use crate::errors::Result;
use crate::repository::Repository;

/// Above this many LCS cells we only report that the entries differ.
const MAX_DIFF_CELLS: usize = 16_000_000;

#[derive(Parser, Debug, Default)]
#[command(name = "diff", about = "Show line differences between two entries")]
pub struct Diff {
    /// Old entry
    a: String,
    /// New entry
    b: String,
}

/// One line of a diff.
#[derive(Debug, PartialEq, Eq)]
pub enum Line<'a> {
    Same(&'a str),
    Removed(&'a str),
    Added(&'a str),
}

impl Subcommand for Diff {
    fn parse(&mut self, _ctx: &Context, args: &[String]) -> Result<()> {
        *self = parse_args("diff", args)?;
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut Context, repo: &mut Repository) -> Result<()> {
        let a = repo.entry(&self.a)?;
        let b = repo.entry(&self.b)?;

        if a.address == b.address {
            output::info(&format!("{} and {} are identical", a.path, b.path));
            return Ok(());
        }

        let (old, new) = (repo.read(a)?, repo.read(b)?);
        let lines = match (std::str::from_utf8(&old), std::str::from_utf8(&new)) {
            (Ok(old), Ok(new)) => diff_lines(old, new),
            _ => None,
        };

        let Some(lines) = lines else {
            output::info(&format!("Entries {} and {} differ", a.path, b.path));
            return Ok(());
        };

        println!("{}", style(format!("--- {}", a.path)).red().bold());
        println!("{}", style(format!("+++ {}", b.path)).green().bold());
        for line in lines {
            match line {
                Line::Same(l) => println!(" {l}"),
                Line::Removed(l) => println!("{}", style(format!("-{l}")).red()),
                Line::Added(l) => println!("{}", style(format!("+{l}")).green()),
            }
        }
        Ok(())
    }
}

/// Longest-common-subsequence line diff. `None` when the inputs are too
/// large to diff in memory.
pub fn diff_lines<'a>(old: &'a str, new: &'a str) -> Option<Vec<Line<'a>>> {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();
    let (n, m) = (a.len(), b.len());

    let cells = (n + 1).checked_mul(m + 1)?;
    if cells > MAX_DIFF_CELLS {
        return None;
    }

    // lcs[i * (m + 1) + j] = LCS length of a[i..] and b[j..]
    let mut lcs = vec![0u32; cells];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i * (m + 1) + j] = if a[i] == b[j] {
                lcs[(i + 1) * (m + 1) + j + 1] + 1
            } else {
                lcs[(i + 1) * (m + 1) + j].max(lcs[i * (m + 1) + j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            out.push(Line::Same(a[i]));
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * (m + 1) + j] >= lcs[i * (m + 1) + j + 1] {
            out.push(Line::Removed(a[i]));
            i += 1;
        } else {
            out.push(Line::Added(b[j]));
            j += 1;
        }
    }
    out.extend(a[i..].iter().map(|l| Line::Removed(*l)));
    out.extend(b[j..].iter().map(|l| Line::Added(*l)));
    Some(out)
}
