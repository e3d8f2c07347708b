// ── Resolver capability ──

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::api::ApiHandle;
use crate::cache::ApiCache;
use crate::client::Client;
use crate::config::ClientConfig;
use crate::uri::Uri;

pub type ResolverHandle = Arc<dyn UriResolver>;

/// The three things a resolver can say about a Uri.
#[derive(Debug, Clone)]
pub enum ResolverOutcome {
    /// Not mine; try the next resolver.
    Pass,
    /// Resolve this Uri instead, starting over from the first resolver.
    Redirect(Uri),
    /// Done.
    Resolved(ApiHandle),
}

/// Everything a resolver may consult. Passed explicitly so concurrent
/// resolutions under different contexts never share state by accident.
pub struct ResolveContext<'a> {
    /// Client handle bound to the resolving call's context.
    pub client: &'a Client,
    /// Effective configuration of that context.
    pub config: &'a ClientConfig,
    pub cache: &'a ApiCache,
}

/// A named resolution strategy.
///
/// Resolvers never fail: an internal problem is logged and reported as
/// [`ResolverOutcome::Pass`] so the rest of the chain still gets a chance.
#[async_trait]
pub trait UriResolver: Send + Sync {
    fn name(&self) -> &str;

    async fn try_resolve(&self, uri: &Uri, cx: &ResolveContext<'_>) -> ResolverOutcome;
}

impl fmt::Debug for dyn UriResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UriResolver({})", self.name())
    }
}
