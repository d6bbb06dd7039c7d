//! Glyphcode CLI - Passcode reconstruction from scanned glyph sheets
//!
//! Command-line interface for the cell extraction and glyph matching pipeline.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::solve::SolveCommand;
use commands::split::SplitCommand;

#[derive(Parser)]
#[command(
    name = "glyphcode",
    version,
    about = "Reconstruct a passcode from a scanned sheet of glyph cells",
    long_about = "Locates the cells of a scanned passcode sheet, matches each cell against a\n\
                  reference image set by perceptual hash, and redraws every column as a glyph\n\
                  built from the matched reference coordinates.\n\n\
                  Two modes:\n  \
                  - split: detect cells only and write the debug overlay\n  \
                  - solve: full reconstruction (overlay + glyph canvas)",
    after_help = "EXAMPLES:\n  \
                  # Check cell detection before solving\n  \
                  glyphcode --config glyphcode.yaml split\n\n  \
                  # Full reconstruction with a JSON report\n  \
                  glyphcode --config glyphcode.yaml solve --report report.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(long, global = true, value_name = "FILE", default_value = "glyphcode.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect cells and write the debug overlay only
    Split(SplitCommand),

    /// Reconstruct the passcode glyphs
    Solve(SolveCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Split(cmd) => cmd.execute(&cli.config).await,
        Commands::Solve(cmd) => cmd.execute(&cli.config).await,
    }
}
