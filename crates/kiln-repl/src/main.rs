//! kiln REPL entry point.
//!
//! ```bash
//! cargo run -p kiln-repl -- --offline
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(name = "kiln", version, about = "In-memory project workspace with GitHub sync")]
struct Cli {
    /// Serve a demo repository from memory instead of talking to GitHub.
    #[arg(long)]
    offline: bool,

    /// Directory for the cached workspace.
    #[arg(long, value_name = "DIR")]
    store: Option<PathBuf>,

    /// Start from the starter project, ignoring the cache.
    #[arg(long)]
    fresh: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respects RUST_LOG; stderr keeps logs out of command output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    kiln_repl::run(kiln_repl::RunOptions {
        offline: cli.offline,
        store_dir: cli.store,
        fresh: cli.fresh,
    })
}
