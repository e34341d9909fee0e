//! # Melody
//!
//! Command-line player over a streaming catalog. Each invocation applies one
//! command to the persisted player session.
//!
//! ## Usage
//!
//! ```bash
//! # Load a catalog, estimating missing audio features
//! melody import songs.json --enrich
//!
//! # Play, finish, and let the smart queue take over
//! melody play 12
//! melody end
//! melody queue
//!
//! # Personal mix from listening history, likes and follows
//! melody mix
//! ```

use anyhow::Result;
use clap::Parser;
use log::debug;
use melody::cli::Args;
use melody::commands;
use melody::config::RuntimeConfig;
use std::io;

/// Initializes logging, parses arguments and runs the command.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug melody next` - queue generation summaries
/// - `RUST_LOG=melody::algorithm=trace melody queue --seed 3` - per-candidate scores
fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = RuntimeConfig::load(args.data_dir.as_deref())?;
    debug!("Using data directory {}", config.data_dir.display());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    commands::run(args.command, &config, &mut out)
}
