//! valicat CLI: validate catalog images against stored checksums and review failures.

use anyhow::Result;
use clap::Parser;
use std::time::Instant;
use valicat::engine::arg_parser::Cli;
use valicat::engine::handle_run;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
