//! Uri resolution engine and invocation orchestrator.
//!
//! Callers address functionality by [`Uri`] and get back a live [`Api`]
//! handle, without knowing up front whether the Uri is served by a plugin,
//! redirected elsewhere, satisfied by an interface implementation, or
//! already cached:
//!
//! - **[`Client`]**: Cheaply cloneable facade over the base configuration,
//!   the shared [`ApiCache`] and live call contexts. Exposes
//!   [`resolve_uri()`](Client::resolve_uri), [`invoke()`](Client::invoke),
//!   [`query()`](Client::query) and [`subscribe()`](Client::subscribe).
//!
//! - **Resolver chain** ([`resolution`]): Ordered [`UriResolver`]s, each
//!   answering pass, redirect or resolved. A redirect restarts the chain;
//!   revisiting a resolution source is an infinite loop. Every attempt is
//!   recorded in a [`ResolutionHistory`].
//!
//! - **Contexts**: Per-call [`ConfigOverride`]s layered over the base
//!   configuration (or over a parent context), identified by [`ContextId`]
//!   and torn down by the call that created them.
//!
//! - **Queries** ([`query`]): GraphQL-shaped documents expanded into named
//!   invocations, run concurrently and merged into a [`QueryResult`].
//!
//! - **[`Subscription`]**: A query re-run on a [`Frequency`], streamed
//!   until stopped.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod query;
pub mod resolution;
pub mod subscription;
pub mod uri;

// ── Primary re-exports ──────────────────────────────────────────────
pub use api::{Api, ApiHandle, FileContent, FileOptions, Invocation, ManifestOptions, ManifestType};
pub use cache::ApiCache;
pub use client::{
    Client, InvokeOptions, QueryInput, QueryOptions, QueryResult, ResolveUriOptions,
    SubscribeOptions,
};
pub use config::{
    ClientConfig, ClientConfigBuilder, ConfigOverride, Env, InterfaceImplementations,
    PluginFactory, PluginRegistration, UriRedirect,
};
pub use context::{ContextGuard, ContextId};
pub use error::CoreError;
pub use query::{QueryDocument, QueryInvocation};
pub use resolution::{
    ResolutionHistory, ResolutionStep, ResolveContext, ResolveUriError, ResolverHandle,
    ResolverOutcome, StepResult, UriResolution, UriResolver,
};
pub use subscription::{DEFAULT_INTERVAL, Frequency, Subscription};
pub use uri::{URI_SCHEME, Uri};
