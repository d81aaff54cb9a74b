//! wikiref CLI
//!
//! Audits the cited links of a wiki article: live status, archive coverage,
//! and capture requests for what is missing.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wikiref::extract::{run_extract, ExtractArgs};
use wikiref::save::{run_save, run_status, SaveArgs, StatusArgs};
use wikiref::scan::{run_check, run_scan, CheckArgs, ScanArgs};

#[derive(Parser)]
#[command(name = "wikiref")]
#[command(author = "RoyalBit Inc.")]
#[command(version)]
#[command(about = "Citation link checker for wiki articles")]
#[command(long_about = "Checks cited links for liveness and Wayback coverage.\n\nCommands:\n  scan      Check every cited link of an article\n  check     Check one URL\n  extract   Parse citations from a wikitext file\n  save      Request archive captures\n  status    Poll a capture job")]
struct Cli {
    /// Debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every cited link of an article
    Scan(ScanArgs),
    /// Live status and archive coverage of one URL
    Check(CheckArgs),
    /// Parse citations from a local wikitext file
    Extract(ExtractArgs),
    /// Request archive captures (Save Page Now)
    Save(SaveArgs),
    /// Poll a capture job
    Status(StatusArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "wikiref=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scan(args) => run_scan(args).await,
        Commands::Check(args) => run_check(args).await,
        Commands::Extract(args) => run_extract(args).await,
        Commands::Save(args) => run_save(args).await,
        Commands::Status(args) => run_status(args).await,
    }
}
