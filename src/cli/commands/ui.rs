//! `kapsul ui`: web interface. Not part of this build.

use clap::Parser;

use super::{parse_args, Subcommand};
use crate::context::Context;
use crate::errors::{KapsulError, Result};
use crate::repository::Repository;

#[derive(Parser, Debug, Default)]
#[command(name = "ui", about = "Browse the capsule in a web interface")]
pub struct Ui {
    /// Address to bind
    #[arg(long)]
    addr: Option<String>,

    /// Do not open a browser window
    #[arg(long)]
    no_spawn: bool,
}

impl Subcommand for Ui {
    fn parse(&mut self, _ctx: &Context, args: &[String]) -> Result<()> {
        *self = parse_args("ui", args)?;
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut Context, _repo: &mut Repository) -> Result<()> {
        tracing::debug!(addr = ?self.addr, no_spawn = self.no_spawn, "ui requested");
        Err(KapsulError::Unsupported("the `ui` command".into()))
    }
}
