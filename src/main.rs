use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod device;
mod error;
mod frame;
mod proto;
mod report;
mod stats;
mod test;

fn main() -> Result<ExitCode> {
    // stdout carries the per-port summary; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();
    test::run(args)
}
