//! Command implementations for the FAERS decoder CLI
//!
//! Each subcommand lives in its own module; this one dispatches to them and
//! maps the result onto a process exit code.

pub mod convert;
pub mod discover;

use crate::cli::args::{Args, Commands};
use crate::constants::EXIT_TASKS_FAILED;

/// How a successful command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything converted or skipped
    Success,
    /// The run finished but some tasks failed
    TasksFailed,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::TasksFailed => EXIT_TASKS_FAILED,
        }
    }
}

/// Main command runner
///
/// Returns `Ok(Outcome::Success)` when no subcommand was given; the caller
/// is expected to have printed help in that case.
pub async fn run(args: Args) -> anyhow::Result<Outcome> {
    match args.command {
        Some(Commands::Convert(convert_args)) => convert::run_convert(convert_args).await,
        Some(Commands::Discover(discover_args)) => discover::run_discover(discover_args).await,
        None => Ok(Outcome::Success),
    }
}
