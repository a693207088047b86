//! Config subcommand handlers.

use std::path::Path;

use locwp_config::{self as config, Settings};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

fn to_toml(settings: &Settings) -> String {
    toml::to_string_pretty(settings).unwrap_or_else(|e| format!("# failed to render settings: {e}"))
}

pub fn handle(args: ConfigArgs, base: &Path, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path(base);
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let settings = config::load_settings(base)?;
            let out = output::render_single(global.output, &settings, to_toml, to_toml)?;
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            let settings = config::load_settings(base)?;
            let written = config::save_settings(base, &settings)?;
            output::note(&format!("Wrote {}", written.display()), global.quiet);
            Ok(())
        }
    }
}
