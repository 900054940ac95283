//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "catalog-ingest")]
#[command(about = "Scrape a paginated product catalog and load it into a catalog store")]
#[command(version)]
pub struct Cli {
    /// Listing URL, or a category id substituted into the listing URL template
    pub target: Option<String>,

    /// Maximum number of listing pages to visit
    #[arg(short, long)]
    pub pages: Option<u32>,

    /// Normalize and insert into the catalog store instead of writing a preview file
    #[arg(long)]
    pub write: bool,

    /// TOML config file
    #[arg(long = "config", env = "CATALOG_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Directory for preview snapshots
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn run_args(&self) -> RunArgs {
        RunArgs {
            target: self.target.clone(),
            pages: self.pages,
            write: self.write,
            config_file: self.config_file.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}
