//! Command dispatch: bridges CLI args -> controller calls -> output formatting.

pub mod apply;
pub mod get;
pub mod list;

use smartzone_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a controller-bound command to its handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Get(args) => get::handle(controller, args, global).await,
        Command::List(args) => list::handle(controller, args, global).await,
        // Apply and Completions are handled before dispatch
        Command::Apply(_) | Command::Completions(_) => Ok(()),
    }
}
