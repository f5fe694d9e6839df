mod cli;
mod config;
mod run;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use engine_logging::engine_error;

use crate::cli::{Cli, Command};
use crate::config::ConfigStatus;

fn main() -> ExitCode {
    let cli = Cli::parse();
    engine_logging::initialize(cli.log_destination(), cli.log_level());

    match execute(&cli) {
        Ok(code) => code,
        Err(err) => {
            engine_error!("{err:#}");
            if cli.quiet {
                eprintln!("Error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli) -> Result<ExitCode> {
    let config = match config::load_or_create(&cli.config)? {
        ConfigStatus::Loaded(config) => config,
        ConfigStatus::CreatedDefault => {
            println!(
                "Created {}. Fill in your Karakeep and Kindle settings, then run again.",
                cli.config.display()
            );
            return Ok(ExitCode::FAILURE);
        }
    };

    match cli.command() {
        Command::Purge { keep_recent } => {
            let removed = run::purge(&config, keep_recent)?;
            println!("Removed {removed} file(s) from {}", config.output.output_dir);
        }
        Command::SendFile { file } => {
            runtime()?.block_on(run::send_existing(&config, &file, cli))?;
        }
        Command::Run => {
            let report = runtime()?.block_on(run::run_pipeline(&config, cli))?;
            println!("{}", run::summary_line(&report));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")
}
