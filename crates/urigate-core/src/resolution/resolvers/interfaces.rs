use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{InterfaceImplementations, UriRedirect};
use crate::resolution::{ResolveContext, ResolverOutcome, UriResolver};
use crate::uri::Uri;

/// Redirects an interface Uri to its first registered implementation.
///
/// Interfaces without implementations pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterfacesResolver;

impl InterfacesResolver {
    pub const NAME: &'static str = "interfaces";
}

#[async_trait]
impl UriResolver for InterfacesResolver {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn try_resolve(&self, uri: &Uri, cx: &ResolveContext<'_>) -> ResolverOutcome {
        let first = implementations_of(uri, &cx.config.interfaces, None)
            .into_iter()
            .next();
        match first {
            Some(implementation) => {
                debug!(interface = %uri, %implementation, "using interface implementation");
                ResolverOutcome::Redirect(implementation)
            }
            None => ResolverOutcome::Pass,
        }
    }
}

/// Follow the redirect table from `uri` until no rule matches.
///
/// A cyclic table stops at the first Uri seen twice.
pub fn apply_redirects(uri: &Uri, redirects: &[UriRedirect]) -> Uri {
    let mut seen: HashSet<&Uri> = HashSet::new();
    let mut current = uri;
    while let Some(redirect) = redirects.iter().find(|r| &r.from == current) {
        if !seen.insert(current) {
            warn!(%uri, "redirect table contains a cycle");
            break;
        }
        current = &redirect.to;
    }
    current.clone()
}

/// Every implementation registered for `interface`, de-duplicated in
/// registration order.
///
/// With `redirects`, interface and implementation Uris are mapped through
/// the redirect table before comparing and returning them.
pub fn implementations_of(
    interface: &Uri,
    interfaces: &[InterfaceImplementations],
    redirects: Option<&[UriRedirect]>,
) -> Vec<Uri> {
    let redirected = |uri: &Uri| match redirects {
        Some(table) => apply_redirects(uri, table),
        None => uri.clone(),
    };

    let mut found: Vec<Uri> = Vec::new();
    for entry in interfaces {
        if &redirected(&entry.interface) != interface {
            continue;
        }
        for implementation in entry.implementations.iter().map(redirected) {
            if !found.contains(&implementation) {
                found.push(implementation);
            }
        }
    }
    found
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn uri(raw: &str) -> Uri {
        Uri::parse(raw).unwrap()
    }

    fn redirect(from: &str, to: &str) -> UriRedirect {
        UriRedirect {
            from: uri(from),
            to: uri(to),
        }
    }

    fn interfaces() -> Vec<InterfaceImplementations> {
        vec![
            InterfaceImplementations {
                interface: uri("ens/iface.eth"),
                implementations: vec![uri("ens/one.eth"), uri("ens/two.eth")],
            },
            InterfaceImplementations {
                interface: uri("ens/old-iface.eth"),
                implementations: vec![uri("ens/two.eth"), uri("ens/three.eth")],
            },
        ]
    }

    #[test]
    fn lists_implementations_without_redirects() {
        let found = implementations_of(&uri("ens/iface.eth"), &interfaces(), None);
        assert_eq!(found, vec![uri("ens/one.eth"), uri("ens/two.eth")]);
    }

    #[test]
    fn redirected_interfaces_merge_and_dedupe() {
        let redirects = vec![
            redirect("ens/old-iface.eth", "ens/iface.eth"),
            redirect("ens/three.eth", "ens/four.eth"),
        ];
        let found = implementations_of(&uri("ens/iface.eth"), &interfaces(), Some(redirects.as_slice()));
        assert_eq!(
            found,
            vec![uri("ens/one.eth"), uri("ens/two.eth"), uri("ens/four.eth")]
        );
    }

    #[test]
    fn apply_redirects_follows_chain() {
        let redirects = vec![redirect("ens/a", "ens/b"), redirect("ens/b", "ens/c")];
        assert_eq!(apply_redirects(&uri("ens/a"), &redirects), uri("ens/c"));
    }

    #[test]
    fn apply_redirects_stops_on_cycle() {
        let redirects = vec![redirect("ens/a", "ens/b"), redirect("ens/b", "ens/a")];
        let end = apply_redirects(&uri("ens/a"), &redirects);
        assert!(end == uri("ens/a") || end == uri("ens/b"));
    }
}
