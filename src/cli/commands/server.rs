//! `kapsul server`: serve a capsule over HTTP.
//!
//! Flags are accepted so scripts written for builds with an HTTP server keep
//! parsing; this build has no server and reports so at execute time.

use clap::Parser;

use super::{parse_args, Subcommand};
use crate::context::Context;
use crate::errors::{KapsulError, Result};
use crate::repository::Repository;

#[derive(Parser, Debug, Default)]
#[command(name = "server", about = "Serve the capsule over HTTP")]
pub struct Server {
    /// Address to listen on
    #[arg(long, default_value = "localhost:9876")]
    listen: String,

    /// Refuse delete requests
    #[arg(long)]
    no_delete: bool,
}

impl Subcommand for Server {
    fn parse(&mut self, _ctx: &Context, args: &[String]) -> Result<()> {
        *self = parse_args("server", args)?;
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut Context, repo: &mut Repository) -> Result<()> {
        tracing::debug!(
            listen = %self.listen,
            no_delete = self.no_delete,
            location = repo.location(),
            "server requested"
        );
        Err(KapsulError::Unsupported("the `server` command".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::fixtures::plaintext_repo;

    #[test]
    fn parses_then_reports_unsupported() {
        let (_dir, mut ctx, mut repo) = plaintext_repo(&[]);
        let mut cmd = Server::default();
        cmd.parse(&ctx, &["--listen".into(), "0.0.0.0:8080".into()])
            .unwrap();
        assert_eq!(cmd.listen, "0.0.0.0:8080");
        assert!(matches!(
            cmd.execute(&mut ctx, &mut repo),
            Err(KapsulError::Unsupported(_))
        ));
    }
}
