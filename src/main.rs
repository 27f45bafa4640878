use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use kapsul::cli::dispatch::Dispatcher;
use kapsul::cli::{build_context, output, usage, Cli};
use kapsul::errors::KapsulError;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.args.is_empty() {
        eprintln!("{}", usage());
        std::process::exit(1);
    }

    let result = build_context(&cli).and_then(|mut ctx| {
        Dispatcher::with_defaults().dispatch(&mut ctx, cli.file.as_deref(), &cli.args)
    });

    match result {
        Ok(()) => {}
        Err(KapsulError::HelpRequested(text)) => print!("{text}"),
        Err(e) => {
            output::error(&e.to_string());
            if matches!(e, KapsulError::UnknownCommand(_) | KapsulError::NoCommand) {
                eprintln!("{}", usage());
            }
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
