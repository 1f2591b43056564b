//! Command dispatch: bridges CLI args -> dashboard calls -> output formatting.

pub mod attendance;
pub mod config_cmd;
pub mod health;
pub mod present;
pub mod stats;
pub mod users;
pub mod util;
pub mod watch;

use cardwatch_core::Dashboard;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    dashboard: &Dashboard,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(dashboard, args, global).await,
        Command::Users(args) => users::handle(dashboard, args, global).await,
        Command::Attendance(args) => attendance::handle(dashboard, args, global).await,
        Command::Present => present::handle(dashboard, global).await,
        Command::Stats => stats::handle(dashboard, global).await,
        Command::Health => health::handle(dashboard, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
