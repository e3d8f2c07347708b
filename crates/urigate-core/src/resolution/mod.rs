// ── Uri resolution ──
//
// Walks the resolver chain for one Uri. A redirect restarts the chain
// from the first resolver against the new Uri; a resolved Api ends it.
// Revisiting a Uri that has already been a resolution source is a cycle.

mod history;
mod resolver;
pub mod resolvers;

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

pub use history::{ResolutionHistory, ResolutionStep, StepResult};
pub use resolver::{ResolveContext, ResolverHandle, ResolverOutcome, UriResolver};

use crate::api::ApiHandle;
use crate::uri::Uri;

/// Why a resolution ended without an Api.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveUriError {
    InfiniteLoop,
    NotFound,
}

/// Outcome of walking the chain for one Uri.
#[derive(Debug, Clone)]
pub struct UriResolution {
    pub api: Option<ApiHandle>,
    /// The last Uri the chain worked on.
    pub uri: Uri,
    pub history: ResolutionHistory,
    pub error: Option<ResolveUriError>,
}

impl UriResolution {
    pub fn is_resolved(&self) -> bool {
        self.api.is_some()
    }
}

/// Resolve `uri` against `resolvers` in order.
///
/// Never loops forever: every redirect target is checked against the set of
/// Uris that have already started a pass over the chain.
pub async fn resolve_uri(
    uri: Uri,
    resolvers: &[ResolverHandle],
    cx: &ResolveContext<'_>,
) -> UriResolution {
    let mut history = ResolutionHistory::default();
    let mut sources: HashSet<Uri> = HashSet::new();
    let mut current = uri;

    'chain: loop {
        sources.insert(current.clone());

        for resolver in resolvers {
            let outcome = resolver.try_resolve(&current, cx).await;
            let name = resolver.name().to_owned();

            match outcome {
                ResolverOutcome::Resolved(api) => {
                    debug!(resolver = %name, uri = %current, "resolved");
                    history.push(ResolutionStep {
                        source_uri: current.clone(),
                        resolver: name,
                        result: StepResult {
                            uri: current.clone(),
                            api: Some(api.clone()),
                        },
                    });
                    return UriResolution {
                        api: Some(api),
                        uri: current,
                        history,
                        error: None,
                    };
                }
                ResolverOutcome::Redirect(next) if next != current => {
                    debug!(resolver = %name, from = %current, to = %next, "redirected");
                    history.push(ResolutionStep {
                        source_uri: current.clone(),
                        resolver: name,
                        result: StepResult {
                            uri: next.clone(),
                            api: None,
                        },
                    });
                    if sources.contains(&next) {
                        debug!(uri = %next, "resolution cycle detected");
                        return UriResolution {
                            api: None,
                            uri: next,
                            history,
                            error: Some(ResolveUriError::InfiniteLoop),
                        };
                    }
                    current = next;
                    continue 'chain;
                }
                ResolverOutcome::Redirect(_) | ResolverOutcome::Pass => {
                    history.push(ResolutionStep {
                        source_uri: current.clone(),
                        resolver: name,
                        result: StepResult {
                            uri: current.clone(),
                            api: None,
                        },
                    });
                }
            }
        }

        debug!(uri = %current, steps = history.len(), "resolver chain exhausted");
        return UriResolution {
            api: None,
            uri: current,
            history,
            error: Some(ResolveUriError::NotFound),
        };
    }
}
