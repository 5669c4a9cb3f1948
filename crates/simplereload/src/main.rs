//! simplereload CLI.
//!
//! Provides commands for:
//! - `serve`: Serve a directory with live reload injected into HTML pages
//! - `watch`: Follow a heartbeat endpoint and report server restarts

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ServeArgs, WatchArgs};
use output::Output;

/// simplereload - reload the browser when the dev server restarts.
#[derive(Parser)]
#[command(name = "simplereload", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve static files with live reload.
    Serve(ServeArgs),
    /// Watch a heartbeat endpoint and report restarts.
    Watch(WatchArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = matches!(&cli.command, Commands::Serve(args) if args.verbose);

    // --verbose enables INFO level, otherwise RUST_LOG decides (ERROR when unset)
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::Serve(args) => {
            let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
            rt.block_on(args.execute())
        }
        Commands::Watch(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
