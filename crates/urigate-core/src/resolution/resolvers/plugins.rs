use async_trait::async_trait;
use tracing::debug;

use crate::resolution::{ResolveContext, ResolverOutcome, UriResolver};
use crate::uri::Uri;

/// Instantiates the plugin registered under the Uri, if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct PluginsResolver;

impl PluginsResolver {
    pub const NAME: &'static str = "plugins";
}

#[async_trait]
impl UriResolver for PluginsResolver {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn try_resolve(&self, uri: &Uri, cx: &ResolveContext<'_>) -> ResolverOutcome {
        match cx.config.plugins.iter().find(|p| &p.uri == uri) {
            Some(registration) => {
                debug!(%uri, "instantiating plugin");
                ResolverOutcome::Resolved(registration.instantiate())
            }
            None => ResolverOutcome::Pass,
        }
    }
}
