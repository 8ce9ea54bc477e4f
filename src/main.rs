//! `lectionary` command-line binary.
//!
//! # Environment Variables
//!
//! - `ANTHROPIC_API_KEY`: Required for generation commands
//! - `DEFAULT_TRANSLATION`, `OUTPUT_DIRECTORY`, `CLAUDE_MODEL`: See `lectionary config`
//! - `RUST_LOG`: Log filter (default: "warn")

use std::process;

use clap::Parser;

use lectionary_engines::cli::{self, Cli};
use lectionary_engines::utilities::printer::Printer;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = cli::run(cli).await {
        Printer::new().error(&format!("{:#}", e));
        process::exit(1);
    }
}
