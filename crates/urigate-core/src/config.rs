// ── Client configuration ──
//
// The resolver-chain inputs. These types describe *what* the client
// resolves against; core never reads config files. Callers (or the
// urigate-config crate) build a `ClientConfig` and hand it in.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::ApiHandle;
use crate::error::CoreError;
use crate::resolution::resolvers::default_resolvers;
use crate::resolution::ResolverHandle;
use crate::uri::Uri;

/// Creates a fresh Api instance for a plugin registration.
pub type PluginFactory = Arc<dyn Fn() -> ApiHandle + Send + Sync>;

/// Static rule retargeting one Uri to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriRedirect {
    pub from: Uri,
    pub to: Uri,
}

/// A plugin served in-process under `uri`.
#[derive(Clone)]
pub struct PluginRegistration {
    pub uri: Uri,
    pub factory: PluginFactory,
}

impl PluginRegistration {
    pub fn new<F>(uri: Uri, factory: F) -> Self
    where
        F: Fn() -> ApiHandle + Send + Sync + 'static,
    {
        Self {
            uri,
            factory: Arc::new(factory),
        }
    }

    pub fn instantiate(&self) -> ApiHandle {
        (self.factory)()
    }
}

impl fmt::Debug for PluginRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistration")
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}

/// Uris registered as satisfying an abstract interface Uri.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceImplementations {
    pub interface: Uri,
    pub implementations: Vec<Uri>,
}

/// Environment bindings handed to the Api at `uri` on every invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Env {
    pub uri: Uri,
    #[serde(default)]
    pub bindings: Map<String, Value>,
}

// ── ClientConfig ─────────────────────────────────────────────────

/// Full configuration of a client or of one call context.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub redirects: Vec<UriRedirect>,
    pub plugins: Vec<PluginRegistration>,
    pub interfaces: Vec<InterfaceImplementations>,
    pub envs: Vec<Env>,
    /// Resolvers in the order they are tried.
    pub resolvers: Vec<ResolverHandle>,
    pub tracing_enabled: bool,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Plugin Uris and interface Uris must be disjoint.
    pub fn validate(&self) -> Result<(), CoreError> {
        let interfaces: HashSet<&Uri> = self.interfaces.iter().map(|i| &i.interface).collect();
        let clashing: Vec<&str> = self
            .plugins
            .iter()
            .filter(|p| interfaces.contains(&p.uri))
            .map(|p| p.uri.as_str())
            .collect();

        if clashing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::ConfigValidation {
                message: format!(
                    "Plugins can't use interfaces for their URI. Invalid plugins: {}",
                    clashing.join(", ")
                ),
            })
        }
    }

    pub fn env_by_uri(&self, uri: &Uri) -> Option<&Env> {
        self.envs.iter().find(|e| &e.uri == uri)
    }

    pub fn resolver_names(&self) -> Vec<String> {
        self.resolvers.iter().map(|r| r.name().to_owned()).collect()
    }
}

// ── ConfigOverride ───────────────────────────────────────────────

/// Per-call overlay. Every `None` field is inherited from the parent
/// context, or from the base configuration when there is no parent.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverride {
    pub redirects: Option<Vec<UriRedirect>>,
    pub plugins: Option<Vec<PluginRegistration>>,
    pub interfaces: Option<Vec<InterfaceImplementations>>,
    pub envs: Option<Vec<Env>>,
    pub resolvers: Option<Vec<ResolverHandle>>,
    pub tracing_enabled: Option<bool>,
}

impl ConfigOverride {
    pub fn with_redirects(mut self, redirects: Vec<UriRedirect>) -> Self {
        self.redirects = Some(redirects);
        self
    }

    pub fn with_plugins(mut self, plugins: Vec<PluginRegistration>) -> Self {
        self.plugins = Some(plugins);
        self
    }

    pub fn with_interfaces(mut self, interfaces: Vec<InterfaceImplementations>) -> Self {
        self.interfaces = Some(interfaces);
        self
    }

    pub fn with_envs(mut self, envs: Vec<Env>) -> Self {
        self.envs = Some(envs);
        self
    }

    pub fn with_resolvers(mut self, resolvers: Vec<ResolverHandle>) -> Self {
        self.resolvers = Some(resolvers);
        self
    }

    pub fn with_tracing_enabled(mut self, enabled: bool) -> Self {
        self.tracing_enabled = Some(enabled);
        self
    }

    /// Merge field-by-field on top of `base`.
    pub fn apply_to(self, base: &ClientConfig) -> ClientConfig {
        ClientConfig {
            redirects: self.redirects.unwrap_or_else(|| base.redirects.clone()),
            plugins: self.plugins.unwrap_or_else(|| base.plugins.clone()),
            interfaces: self.interfaces.unwrap_or_else(|| base.interfaces.clone()),
            envs: self.envs.unwrap_or_else(|| base.envs.clone()),
            resolvers: self.resolvers.unwrap_or_else(|| base.resolvers.clone()),
            tracing_enabled: self.tracing_enabled.unwrap_or(base.tracing_enabled),
        }
    }
}

// ── Builder ──────────────────────────────────────────────────────

/// Builds a [`ClientConfig`] from raw Uri strings.
///
/// Parsing errors are deferred: the first one is returned from
/// [`build()`](Self::build).
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
    no_defaults: bool,
    error: Option<CoreError>,
}

impl ClientConfigBuilder {
    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        if let Some((from, to)) = self.parse(from).zip(self.parse(to)) {
            self.config.redirects.push(UriRedirect { from, to });
        }
        self
    }

    pub fn plugin<F>(mut self, uri: &str, factory: F) -> Self
    where
        F: Fn() -> ApiHandle + Send + Sync + 'static,
    {
        if let Some(uri) = self.parse(uri) {
            self.config.plugins.push(PluginRegistration::new(uri, factory));
        }
        self
    }

    pub fn interface<'a>(
        mut self,
        interface: &str,
        implementations: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let interface = self.parse(interface);
        let implementations: Vec<Uri> = implementations
            .into_iter()
            .filter_map(|raw| self.parse(raw))
            .collect();
        if let Some(interface) = interface {
            self.config.interfaces.push(InterfaceImplementations {
                interface,
                implementations,
            });
        }
        self
    }

    pub fn env(mut self, uri: &str, bindings: Map<String, Value>) -> Self {
        if let Some(uri) = self.parse(uri) {
            self.config.envs.push(Env { uri, bindings });
        }
        self
    }

    pub fn resolver(mut self, resolver: ResolverHandle) -> Self {
        self.config.resolvers.push(resolver);
        self
    }

    pub fn tracing_enabled(mut self, enabled: bool) -> Self {
        self.config.tracing_enabled = enabled;
        self
    }

    /// Skip the default resolver chain; only explicitly added resolvers run.
    pub fn no_defaults(mut self) -> Self {
        self.no_defaults = true;
        self
    }

    pub fn build(self) -> Result<ClientConfig, CoreError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut config = self.config;
        if !self.no_defaults {
            let user = std::mem::take(&mut config.resolvers);
            config.resolvers = default_resolvers();
            config.resolvers.extend(user);
        }

        config.validate()?;
        Ok(config)
    }

    fn parse(&mut self, raw: &str) -> Option<Uri> {
        match Uri::parse(raw) {
            Ok(uri) => Some(uri),
            Err(err) => {
                self.error.get_or_insert(err);
                None
            }
        }
    }
}
