// ── Extension resolver ──
//
// Delegates resolution to Apis that implement the Uri-resolver
// interface. Each implementation is asked, in registration order,
// to `tryResolveUri`; the first one answering with a different Uri wins.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::implementations_of;
use crate::client::InvokeOptions;
use crate::resolution::{ResolveContext, ResolverOutcome, UriResolver};
use crate::uri::Uri;

/// Interface implemented by Apis that can resolve other Uris.
pub const URI_RESOLVER_INTERFACE: &str = "w3://ens/uri-resolver.core.web3api";

const TRY_RESOLVE_METHOD: &str = "tryResolveUri";

pub struct ExtensionResolver {
    interface: String,
}

impl ExtensionResolver {
    pub const NAME: &'static str = "extension";

    /// Resolve through implementations of a custom resolver interface.
    pub fn new(interface: &Uri) -> Self {
        Self {
            interface: interface.as_str().to_owned(),
        }
    }

    async fn ask(&self, implementation: &Uri, uri: &Uri, cx: &ResolveContext<'_>) -> Option<Uri> {
        // An implementation whose own resolution reaches this resolver
        // again must not be asked twice on one call stack.
        if cx.client.is_consulting(implementation) {
            debug!(%implementation, %uri, "uri resolver extension already consulted, skipping");
            return None;
        }
        let client = cx.client.consulting(implementation);

        let options = InvokeOptions::new(implementation.clone(), TRY_RESOLVE_METHOD)
            .arg("authority", uri.authority())
            .arg("path", uri.path());

        let value = match client.invoke(options).await {
            Ok(value) => value,
            Err(err) => {
                warn!(%implementation, %uri, error = %err, "uri resolver extension failed");
                return None;
            }
        };

        match value.get("uri").and_then(Value::as_str) {
            Some(raw) => match Uri::parse(raw) {
                Ok(next) => Some(next),
                Err(err) => {
                    warn!(%implementation, error = %err, "uri resolver extension returned an invalid uri");
                    None
                }
            },
            None => {
                if value.get("manifest").is_some_and(|m| !m.is_null()) {
                    debug!(%implementation, %uri, "manifest answers need a module loader, skipping");
                }
                None
            }
        }
    }
}

impl Default for ExtensionResolver {
    fn default() -> Self {
        Self {
            interface: URI_RESOLVER_INTERFACE.to_owned(),
        }
    }
}

#[async_trait]
impl UriResolver for ExtensionResolver {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn try_resolve(&self, uri: &Uri, cx: &ResolveContext<'_>) -> ResolverOutcome {
        let Some(interface) = cx
            .config
            .interfaces
            .iter()
            .map(|i| &i.interface)
            .find(|i| i.as_str() == self.interface)
        else {
            return ResolverOutcome::Pass;
        };

        let implementations = implementations_of(interface, &cx.config.interfaces, None);
        if implementations.contains(uri) {
            return ResolverOutcome::Pass;
        }

        for implementation in &implementations {
            if let Some(next) = self.ask(implementation, uri, cx).await {
                if &next != uri {
                    return ResolverOutcome::Redirect(next);
                }
            }
        }
        ResolverOutcome::Pass
    }
}
