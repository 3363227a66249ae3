mod app;
mod commands;
mod output;

#[cfg(test)]
#[path = "../../src/test/mod.rs"]
mod fixtures;

use anyhow::Context;
use clap::Parser;

use crate::app::Cli;

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })
    .context("failed to set Ctrl+C handler")?;

    let cli = Cli::parse();

    output::init_logger(cli.options.verbose);
    output::print_header();

    let result = commands::patch::run(&cli.path, &cli.options);
    if let Err(error) = &result {
        log::error!("{error:#}");
    }
    result
}
