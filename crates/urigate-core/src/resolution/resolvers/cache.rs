use async_trait::async_trait;

use crate::resolution::{ResolveContext, ResolverOutcome, UriResolver};
use crate::uri::Uri;

/// Short-circuits to a previously resolved Api.
///
/// The client drops this resolver from the chain for calls that must not
/// read the cache, so it never checks any flags itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheResolver;

impl CacheResolver {
    pub const NAME: &'static str = "cache";
}

#[async_trait]
impl UriResolver for CacheResolver {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn try_resolve(&self, uri: &Uri, cx: &ResolveContext<'_>) -> ResolverOutcome {
        cx.cache
            .get(uri)
            .map_or(ResolverOutcome::Pass, ResolverOutcome::Resolved)
    }
}
