//! `urigate config`: inspect and initialise the configuration file.

use tracing::info;
use urigate_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::{config_file, load};

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match &args.command {
        ConfigCommand::Init { force } => {
            let path = config_file(global);
            if path.exists() && !*force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            urigate_config::save_config(&Config::default(), &path)?;
            info!(path = %path.display(), "configuration written");
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let config = load(global)?;
            // Reject what a client would reject, before showing it as valid.
            config.to_client_config()?;

            let rendered = match global.output {
                OutputFormat::Json | OutputFormat::JsonCompact => {
                    output::render_single(&global.output, &config, |_| String::new())?
                }
                OutputFormat::Table | OutputFormat::Plain => config.to_toml()?,
            };
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config_file(global).display().to_string(), global.quiet);
            Ok(())
        }
    }
}
