mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use locwp_config as config;
use locwp_core::{Allocator, ProcessExecutor, SiteManager};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "locwp", &mut std::io::stdout());
            Ok(())
        }

        // Config commands only need the base directory
        Command::Config(args) => {
            let base = config::base_dir()?;
            commands::config_cmd::handle(args, &base, &cli.global)
        }

        // Everything else runs against the site registry
        cmd => {
            let base = config::base_dir()?;
            config::ensure_base_dir(&base)?;
            let settings = config::load_settings(&base)?;
            tracing::debug!(base = %base.display(), ?settings, "settings loaded");

            let manager = SiteManager::new(
                settings.layout(&base),
                Allocator::new(settings.identity_strategy()),
                ProcessExecutor::new(&settings.executor),
            )
            .with_probe_timeout(settings.probe_timeout())
            .with_fpm_user(config::current_user());

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &manager, &settings, &cli.global).await
        }
    }
}
