//! Command dispatch: loads configuration, builds a client, routes to handlers.

pub mod config_cmd;
pub mod implementations;
pub mod resolve;

use std::path::PathBuf;

use tracing::debug;
use urigate_config::Config;
use urigate_core::{Client, Uri};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Route a parsed command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Resolve(args) => resolve::handle(&args, global).await,
        Command::Implementations(args) => implementations::handle(&args, global),
        Command::Config(args) => config_cmd::handle(&args, global),
        // Completions are handled before dispatch.
        Command::Completions(_) => Ok(()),
    }
}

// ── Shared helpers ──────────────────────────────────────────────────

/// The config file this invocation reads and writes.
pub(crate) fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(urigate_config::config_path)
}

pub(crate) fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_file(global);
    debug!(path = %path.display(), "loading configuration");
    Ok(urigate_config::load_config_from(&path)?)
}

/// Client built from the config file, without plugins.
pub(crate) fn build_client(global: &GlobalOpts) -> Result<Client, CliError> {
    let config = load(global)?.to_client_config()?;
    Ok(Client::new(config)?)
}

pub(crate) fn parse_uri(raw: &str) -> Result<Uri, CliError> {
    Ok(raw.parse::<Uri>()?)
}
