//! Command dispatch: bridges CLI args to the realtime core and output formatting.

pub mod alerts;
pub mod config_cmd;
pub mod send;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(args, global).await,
        Command::Send(args) => send::handle(args, global).await,
        Command::Alerts(args) => alerts::handle(args, global).await,
        Command::Config(args) => config_cmd::handle(args, global),
        // Completions are generated before dispatch
        Command::Completions(_) => Ok(()),
    }
}
