//! exsync - Todoist to Exist.io habit sync CLI
//!
//! Runs the webhook server or a one-off refresh of the stats comments.

use clap::Parser;
use exsync::cli::Cli;
use exsync::config::parse_bool;
use exsync::output::{emit_error, infer_command_name_from_args};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    let command = infer_command_name_from_args();
    let cli = Cli::parse();

    let debug = cli.debug
        || std::env::var("DEBUG")
            .map(|raw| parse_bool(&raw))
            .unwrap_or(false);

    // RUST_LOG wins; ignore invalid/huge filters.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new(if debug { "debug" } else { "info" }));

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
