use async_trait::async_trait;

use crate::resolution::{ResolveContext, ResolverOutcome, UriResolver};
use crate::uri::Uri;

/// Follows the configured redirect table, one hop per step so every hop
/// shows up in the history.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectsResolver;

impl RedirectsResolver {
    pub const NAME: &'static str = "redirects";
}

#[async_trait]
impl UriResolver for RedirectsResolver {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn try_resolve(&self, uri: &Uri, cx: &ResolveContext<'_>) -> ResolverOutcome {
        cx.config
            .redirects
            .iter()
            .find(|r| &r.from == uri)
            .map_or(ResolverOutcome::Pass, |r| {
                ResolverOutcome::Redirect(r.to.clone())
            })
    }
}
