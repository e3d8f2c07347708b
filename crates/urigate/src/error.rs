//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use urigate_config::ConfigError;
use urigate_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CYCLE: i32 = 5;
    pub const CONFLICT: i32 = 6;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Resolution ───────────────────────────────────────────────────

    #[error("No API found at {uri}")]
    #[diagnostic(
        code(urigate::not_found),
        help(
            "Every resolver passed. Add a redirect, an interface implementation\n\
             or a resolver extension for this Uri.\n\
             Resolution history: {history}"
        )
    )]
    NotFound { uri: String, history: String },

    #[error("Infinite loop while resolving {uri}")]
    #[diagnostic(
        code(urigate::infinite_loop),
        help(
            "A redirect led back to a Uri that was already resolved in this call.\n\
             Resolution history: {history}"
        )
    )]
    InfiniteLoop { uri: String, history: String },

    #[error("Invalid URI '{uri}': {reason}")]
    #[diagnostic(
        code(urigate::invalid_uri),
        help("Uris look like w3://authority/path, e.g. w3://ens/api.eth")
    )]
    InvalidUri { uri: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(urigate::engine))]
    Engine(Box<CoreError>),

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(urigate::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(urigate::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(urigate::config))]
    Config(Box<figment::Error>),

    #[error("Failed to serialize config: {0}")]
    #[diagnostic(code(urigate::serialization))]
    Serialization(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(urigate::json))]
    Json(#[from] serde_json::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::InfiniteLoop { .. } => exit_code::CYCLE,
            Self::InvalidUri { .. } | Self::Validation { .. } => exit_code::USAGE,
            Self::ConfigExists { .. } => exit_code::CONFLICT,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { uri, history } => CliError::NotFound {
                uri: uri.to_string(),
                history: history.to_string(),
            },

            CoreError::InfiniteLoop { uri, history } => CliError::InfiniteLoop {
                uri: uri.to_string(),
                history: history.to_string(),
            },

            CoreError::InvalidUri { uri, reason } => CliError::InvalidUri { uri, reason },

            CoreError::ConfigValidation { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            other => CliError::Engine(Box::new(other)),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Core(core) => core.into(),
            ConfigError::Serialization(e) => CliError::Serialization(e.to_string()),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
