//! Command-line interface for Agora.
//!
//! Global flags configure storage (see [`crate::config`]) and name the
//! acting user with `--as <user-id>`; the remaining words select a command.
//! Results are printed as JSON.

pub mod args;
pub mod commands;
pub mod utils;

use crate::config::AgoraConfig;
use crate::forum::ForumService;
use crate::Result;
use std::env;
use tracing::error;

pub use args::{Command, Invocation, Target};
pub use commands::execute;
pub use utils::*;

/// Main entry point for the CLI application
pub fn run() -> Result<()> {
    let mut raw: Vec<String> = env::args().skip(1).collect();

    let mut config = AgoraConfig::from_env()?;
    config.apply_args(&mut raw)?;
    let invocation = args::parse_args(raw)?;

    if invocation.command == Command::Help {
        args::print_usage();
        return Ok(());
    }

    let service = ForumService::open(&config)?;
    let output = commands::execute(&service, invocation.actor, invocation.command);

    match output {
        Ok(value) => print_json(&value),
        Err(e) => {
            if e.is_internal() {
                error!(error = %e, "Command failed");
            }
            Err(e)
        }
    }
}
