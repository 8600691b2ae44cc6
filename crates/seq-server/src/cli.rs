//! Command-line arguments

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Run and inspect equipment automation sequences
#[derive(Debug, Clone, Parser)]
#[command(name = "sequencer", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Settings file (YAML); defaults apply when omitted
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `seq_script=trace`.
    ///
    /// If omitted, `SEQUENCER_LOG`, then the settings file, then `info`.
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a sequence against simulated equipment; Ctrl-C cancels
    Run {
        #[command(flatten)]
        document: DocumentArg,

        /// Bypass the pre-run validation gate
        #[arg(long)]
        skip_validation: bool,
    },

    /// Print validation issues; exits non-zero when the sequence is invalid
    Validate {
        #[command(flatten)]
        document: DocumentArg,
    },

    /// Print the estimated duration
    Estimate {
        #[command(flatten)]
        document: DocumentArg,
    },

    /// Print the sequence outline with per-entity estimates
    Show {
        #[command(flatten)]
        document: DocumentArg,
    },
}

impl Command {
    pub fn document(&self) -> &PathBuf {
        match self {
            Command::Run { document, .. }
            | Command::Validate { document }
            | Command::Estimate { document }
            | Command::Show { document } => &document.file,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct DocumentArg {
    /// Sequence document (`.yaml`, `.yml` or `.json`)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "sequencer",
            "run",
            "night.yaml",
            "--skip-validation",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Command::Run {
                skip_validation: true,
                ..
            }
        ));
        assert_eq!(cli.command.document(), &PathBuf::from("night.yaml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.settings.is_none());
    }

    #[test]
    fn test_global_settings_before_subcommand() {
        let cli =
            Cli::try_parse_from(["sequencer", "--settings", "s.yaml", "show", "n.json"]).unwrap();

        assert!(matches!(cli.command, Command::Show { .. }));
        assert_eq!(cli.settings, Some(PathBuf::from("s.yaml")));
    }

    #[test]
    fn test_file_is_required() {
        assert!(Cli::try_parse_from(["sequencer", "validate"]).is_err());
    }
}
