//! mdfig CLI - Mermaid figures for Markdown.
//!
//! Provides commands for:
//! - `render`: Replace Mermaid blocks with rendered images and captions
//! - `blocks`: List the Mermaid blocks of a document without rendering

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{BlocksArgs, RenderArgs};
use error::CliError;
use output::Output;

/// mdfig - Render Mermaid diagrams in Markdown to figures.
#[derive(Parser)]
#[command(name = "mdfig", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render Mermaid blocks to PNG images and write the rewritten document.
    Render(RenderArgs),
    /// List Mermaid blocks with their labels and image file names.
    Blocks(BlocksArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = matches!(&cli.command, Commands::Render(args) if args.verbose);

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Render(args) => tokio::runtime::Runtime::new()
            .map_err(CliError::from)
            .and_then(|rt| rt.block_on(args.execute())),
        Commands::Blocks(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
