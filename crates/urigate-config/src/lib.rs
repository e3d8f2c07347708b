//! Declarative configuration for urigate clients.
//!
//! A TOML file plus a `URIGATE_*` environment overlay, translated into a
//! validated `urigate_core::ClientConfig`. Plugins are code, so they never
//! appear here; callers add them to the returned builder.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use urigate_core::resolution::resolvers::builtin_resolver;
use urigate_core::{ClientConfig, ClientConfigBuilder, CoreError};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Emit `info` spans around resolution and invocation.
    #[serde(default)]
    pub tracing_enabled: bool,

    /// Built-in resolvers by name, in chain order.
    #[serde(default = "default_resolvers")]
    pub resolvers: Vec<String>,

    #[serde(default)]
    pub redirects: Vec<RedirectEntry>,

    #[serde(default)]
    pub interfaces: Vec<InterfaceEntry>,

    #[serde(default)]
    pub envs: Vec<EnvEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracing_enabled: false,
            resolvers: default_resolvers(),
            redirects: Vec::new(),
            interfaces: Vec::new(),
            envs: Vec::new(),
        }
    }
}

fn default_resolvers() -> Vec<String> {
    ["redirects", "plugins", "interfaces", "cache", "extension"]
        .map(String::from)
        .to_vec()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RedirectEntry {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InterfaceEntry {
    pub interface: String,
    #[serde(default)]
    pub implementations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EnvEntry {
    pub uri: String,
    #[serde(default)]
    pub bindings: Map<String, Value>,
}

impl Config {
    /// A client builder carrying everything this file describes.
    ///
    /// Uri parse errors surface from the builder's `build()`; unknown
    /// resolver names are rejected here.
    pub fn builder(&self) -> Result<ClientConfigBuilder, ConfigError> {
        let mut builder = ClientConfig::builder()
            .no_defaults()
            .tracing_enabled(self.tracing_enabled);

        for name in &self.resolvers {
            let resolver = builtin_resolver(name).ok_or_else(|| ConfigError::Validation {
                field: "resolvers".into(),
                reason: format!(
                    "unknown resolver '{name}', expected one of redirects, plugins, interfaces, cache, extension"
                ),
            })?;
            builder = builder.resolver(resolver);
        }
        for redirect in &self.redirects {
            builder = builder.redirect(&redirect.from, &redirect.to);
        }
        for entry in &self.interfaces {
            builder = builder.interface(
                &entry.interface,
                entry.implementations.iter().map(String::as_str),
            );
        }
        for env in &self.envs {
            builder = builder.env(&env.uri, env.bindings.clone());
        }

        Ok(builder)
    }

    /// Validated client configuration, without plugins.
    pub fn to_client_config(&self) -> Result<ClientConfig, ConfigError> {
        Ok(self.builder()?.build()?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "urigate", "urigate").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("urigate");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the platform config path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` plus environment. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("URIGATE_").only(&["tracing_enabled"]));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parent
/// directories.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, cfg.to_toml()?)?;
    Ok(())
}
