//! Sequencer command-line tool
//!
//! Loads a sequence document against simulated equipment and runs,
//! validates, estimates or outlines it.

mod cli;
mod commands;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use seq_config::{Registry, Settings};
use seq_script::{Engine, Sequencer};
use std::process::ExitCode;
use tracing::{debug, info};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    match run_main().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("sequencer error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run_main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.apply_env()?;

    let filter = cli.log_level.clone().unwrap_or_else(|| settings.log_level.clone());
    logging::init_logging(&filter)?;
    debug!(?settings, "Settings loaded");

    if let Command::Run {
        skip_validation: true,
        ..
    } = cli.command
    {
        settings.engine.skip_validation = true;
    }

    let registry = Registry::with_builtins(settings.equipment.build());
    let path = cli.command.document();
    let tree = registry
        .load(path)
        .with_context(|| format!("cannot load sequence {}", path.display()))?;
    let sequencer = Sequencer::with_engine(tree, Engine::new(settings.engine.clone()));

    match cli.command {
        Command::Run { .. } => {
            info!(path = %path.display(), "Starting sequence");
            let report = commands::run(&sequencer).await?;
            for line in commands::validation_lines(&report.issues, sequencer.engine().formatter()) {
                println!("✗ {line}");
            }
            println!(
                "Run {} {} in {}",
                report.run_id,
                report.outcome,
                commands::format_duration(report.elapsed().to_std().unwrap_or_default())
            );
            Ok(commands::run_exit_code(&report.outcome))
        }
        Command::Validate { .. } => {
            let report = sequencer.validate()?;
            if report.is_valid() {
                println!("✓ {} is valid", path.display());
                return Ok(ExitCode::SUCCESS);
            }
            for line in commands::validation_lines(&report, sequencer.engine().formatter()) {
                println!("✗ {line}");
            }
            Ok(ExitCode::FAILURE)
        }
        Command::Estimate { .. } => {
            println!("{}", commands::format_duration(sequencer.estimate()?));
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { .. } => {
            print!("{}", commands::outline(sequencer.tree())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
