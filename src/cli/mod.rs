//! CLI module for aerohandler
//!
//! Provides command-line interface for:
//! - session: drive one handle manager with JSON commands
//! - check: validate fixture and configuration

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check, load_fixture, run, run_command, run_session, SessionCommand};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_requests, write_error, write_response};
