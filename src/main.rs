//! chorehub - shared household chores
//!
//! Serves the household HTTP API with live push and reminders, and offers
//! the same operations as one-shot commands against the data directory.

use clap::Parser;
use chorehub::cli::Cli;
use chorehub::output::{emit_error, infer_command_name_from_args};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    let command = infer_command_name_from_args();
    let cli = Cli::parse();

    // Commands stay quiet unless RUST_LOG asks otherwise; the server logs
    // requests and reminders by default. Invalid or huge filters are ignored.
    let fallback = if cli.is_serve() {
        "chorehub=info,tower_http=info"
    } else {
        "off"
    };
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let json = cli.json;
    if let Err(err) = cli.run() {
        let _ = emit_error(&command, &err, json);
        std::process::exit(err.exit_code());
    }
}
