use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Strata: hierarchical archive with ACLs and chunked blob storage",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Ingest a local directory tree into a fresh archive
    Ingest(IngestArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct IngestArgs {
    /// Directory to ingest
    pub source: PathBuf,
    /// Group granted write access to everything ingested
    #[arg(short, long)]
    pub group: String,
    /// User on whose behalf the ingest runs
    #[arg(short, long)]
    pub user: String,
    /// Address recorded in reference URLs
    #[arg(long)]
    pub local_ip: Option<String>,
    /// Record file:// references instead of copying content
    #[arg(long)]
    pub no_import: bool,
    /// Only ingest files whose path contains this string
    #[arg(long)]
    pub include: Option<String>,
    /// Worker threads (clamped to the configured range)
    #[arg(short, long)]
    pub workers: Option<usize>,
}
