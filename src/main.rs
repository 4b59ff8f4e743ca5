//! Ghostscan CLI: scan an account's followers or follows for inactive members.

use anyhow::Result;
use clap::Parser;
use ghostscan::engine::arg_parser::Cli;
use ghostscan::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
