// ── Built-in resolvers ──

mod cache;
mod extension;
mod interfaces;
mod plugins;
mod redirects;

use std::sync::Arc;

pub use cache::CacheResolver;
pub use extension::{ExtensionResolver, URI_RESOLVER_INTERFACE};
pub use interfaces::{InterfacesResolver, apply_redirects, implementations_of};
pub use plugins::PluginsResolver;
pub use redirects::RedirectsResolver;

use super::ResolverHandle;

/// The chain a client gets unless built with `no_defaults()`:
/// redirects, plugins, interfaces, cache, extension.
pub fn default_resolvers() -> Vec<ResolverHandle> {
    vec![
        Arc::new(RedirectsResolver),
        Arc::new(PluginsResolver),
        Arc::new(InterfacesResolver),
        Arc::new(CacheResolver),
        Arc::new(ExtensionResolver::default()),
    ]
}

/// Look up a built-in resolver by its name.
pub fn builtin_resolver(name: &str) -> Option<ResolverHandle> {
    let resolver: ResolverHandle = match name {
        RedirectsResolver::NAME => Arc::new(RedirectsResolver),
        PluginsResolver::NAME => Arc::new(PluginsResolver),
        InterfacesResolver::NAME => Arc::new(InterfacesResolver),
        CacheResolver::NAME => Arc::new(CacheResolver),
        ExtensionResolver::NAME => Arc::new(ExtensionResolver::default()),
        _ => return None,
    };
    Some(resolver)
}
