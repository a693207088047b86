//! Command dispatch: bridges CLI args -> `SiteManager` -> output formatting.

pub mod config_cmd;
pub mod sites;
pub mod util;

use locwp_config::Settings;
use locwp_core::{ProcessExecutor, SiteManager};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// The manager every site command runs against.
pub type Manager = SiteManager<ProcessExecutor>;

/// Dispatch a site command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    manager: &Manager,
    settings: &Settings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Add(args) => sites::add(manager, settings, args, global).await,
        Command::Start(args) => sites::start(manager, &args.name, global).await,
        Command::Stop(args) => sites::stop(manager, &args.name, global).await,
        Command::Delete(args) => sites::delete(manager, &args.name, global).await,
        Command::List => sites::list(manager, global).await,
        Command::Status(args) => sites::status(manager, &args.name, global).await,
        Command::Wp(args) => sites::wp(manager, args).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
