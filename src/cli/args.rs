//! CLI argument definitions using clap
//!
//! Commands:
//! - aerohandler session --fixture <path> [--config <path>]
//! - aerohandler check --fixture <path> [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aerohandler - direct table handles over an in-memory catalog
#[derive(Parser, Debug)]
#[command(name = "aerohandler")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one handler session: JSON commands on stdin, JSON responses on stdout
    Session {
        /// JSON file with the tables to load
        #[arg(long)]
        fixture: PathBuf,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate a fixture and configuration, then exit
    Check {
        /// JSON file with the tables to load
        #[arg(long)]
        fixture: PathBuf,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session() {
        let cli = Cli::try_parse_from([
            "aerohandler",
            "session",
            "--fixture",
            "tables.json",
            "--config",
            "cfg.json",
        ])
        .unwrap();
        match cli.command {
            Command::Session { fixture, config } => {
                assert_eq!(fixture, PathBuf::from("tables.json"));
                assert_eq!(config, Some(PathBuf::from("cfg.json")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_fixture_is_required() {
        assert!(Cli::try_parse_from(["aerohandler", "check"]).is_err());
    }
}
