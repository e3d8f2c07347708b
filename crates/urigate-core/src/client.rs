// ── Client ──
//
// Public entry point of the engine. Owns the base configuration, the
// shared Api cache and the live call contexts, and exposes resolution
// plus the three invocation shapes: `invoke`, `query` and `subscribe`.
//
// A `Client` is a cheap handle. Every clone shares the same state; a
// handle may additionally be bound to a call context, which is how Apis
// and resolvers see the configuration of the call that reached them.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use arc_swap::ArcSwap;
use futures_util::FutureExt;
use futures_util::future::join_all;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{Instrument, Span, debug, info_span};

use crate::api::{ApiHandle, FileContent, FileOptions, Invocation, ManifestOptions};
use crate::cache::ApiCache;
use crate::config::{
    ClientConfig, ConfigOverride, Env, InterfaceImplementations, PluginRegistration, UriRedirect,
};
use crate::context::{ContextGuard, ContextId, ContextManager};
use crate::error::CoreError;
use crate::query::{QueryDocument, parse_query};
use crate::resolution::resolvers::{CacheResolver, implementations_of};
use crate::resolution::{
    self, ResolveContext, ResolveUriError, ResolverHandle, UriResolution,
};
use crate::subscription::{Frequency, Subscription};
use crate::uri::Uri;

// ── Call options ────────────────────────────────────────────────────

/// Options for [`Client::resolve_uri`].
#[derive(Debug, Clone, Default)]
pub struct ResolveUriOptions {
    /// Skip the cache resolver for this call.
    pub no_cache_read: bool,
    /// Do not memoize the outcome of this call.
    pub no_cache_write: bool,
    pub config: Option<ConfigOverride>,
    pub context_id: Option<ContextId>,
}

/// Options for [`Client::invoke`].
#[derive(Debug, Clone)]
pub struct InvokeOptions {
    pub uri: Uri,
    pub method: String,
    pub args: Map<String, Value>,
    pub config: Option<ConfigOverride>,
    pub context_id: Option<ContextId>,
}

impl InvokeOptions {
    pub fn new(uri: Uri, method: &str) -> Self {
        Self {
            uri,
            method: method.to_owned(),
            args: Map::new(),
            config: None,
            context_id: None,
        }
    }

    pub fn arg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.args.insert(name.to_owned(), value.into());
        self
    }

    pub fn args(mut self, args: Map<String, Value>) -> Self {
        self.args = args;
        self
    }

    pub fn config(mut self, config: ConfigOverride) -> Self {
        self.config = Some(config);
        self
    }

    pub fn context_id(mut self, id: ContextId) -> Self {
        self.context_id = Some(id);
        self
    }
}

/// A query as text or as an already parsed document.
#[derive(Debug, Clone)]
pub enum QueryInput {
    Text(String),
    Document(QueryDocument),
}

impl QueryInput {
    fn into_document(self) -> Result<QueryDocument, CoreError> {
        match self {
            Self::Text(text) => QueryDocument::parse(&text),
            Self::Document(document) => Ok(document),
        }
    }
}

impl From<&str> for QueryInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for QueryInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<QueryDocument> for QueryInput {
    fn from(document: QueryDocument) -> Self {
        Self::Document(document)
    }
}

/// Options for [`Client::query`].
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub uri: Uri,
    pub query: QueryInput,
    pub variables: Map<String, Value>,
    pub config: Option<ConfigOverride>,
    pub context_id: Option<ContextId>,
}

impl QueryOptions {
    pub fn new(uri: Uri, query: impl Into<QueryInput>) -> Self {
        Self {
            uri,
            query: query.into(),
            variables: Map::new(),
            config: None,
            context_id: None,
        }
    }

    pub fn variable(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.variables.insert(name.to_owned(), value.into());
        self
    }

    pub fn config(mut self, config: ConfigOverride) -> Self {
        self.config = Some(config);
        self
    }

    pub fn context_id(mut self, id: ContextId) -> Self {
        self.context_id = Some(id);
        self
    }
}

/// Options for [`Client::subscribe`].
#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    pub uri: Uri,
    pub query: QueryInput,
    pub variables: Map<String, Value>,
    /// Poll interval; one minute when unset.
    pub frequency: Option<Frequency>,
    pub config: Option<ConfigOverride>,
    pub context_id: Option<ContextId>,
}

impl SubscribeOptions {
    pub fn new(uri: Uri, query: impl Into<QueryInput>) -> Self {
        Self {
            uri,
            query: query.into(),
            variables: Map::new(),
            frequency: None,
            config: None,
            context_id: None,
        }
    }

    pub fn variable(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.variables.insert(name.to_owned(), value.into());
        self
    }

    pub fn frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn config(mut self, config: ConfigOverride) -> Self {
        self.config = Some(config);
        self
    }

    pub fn context_id(mut self, id: ContextId) -> Self {
        self.context_id = Some(id);
        self
    }
}

/// Aggregated outcome of a query: every successful invocation keyed by its
/// result name, and every failure.
#[derive(Debug, Default, Serialize)]
pub struct QueryResult {
    pub data: IndexMap<String, Value>,
    #[serde(serialize_with = "serialize_errors")]
    pub errors: Vec<CoreError>,
}

impl QueryResult {
    fn failed(error: CoreError) -> Self {
        Self {
            data: IndexMap::new(),
            errors: vec![error],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

fn serialize_errors<S: serde::Serializer>(
    errors: &[CoreError],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(errors.iter().map(ToString::to_string))
}

// ── Client ──────────────────────────────────────────────────────────

/// Handle to a resolution engine. Cheaply cloneable.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
    /// Context this handle is bound to. `None` reads the base configuration.
    context: Option<ContextId>,
    /// Resolver extensions being consulted further up this call stack.
    consulting: Arc<[Uri]>,
}

struct ClientInner {
    config: ArcSwap<ClientConfig>,
    cache: ApiCache,
    contexts: ContextManager,
}

impl Client {
    /// Create a client over a validated base configuration.
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        config.validate()?;
        debug!(
            resolvers = ?config.resolver_names(),
            plugins = config.plugins.len(),
            redirects = config.redirects.len(),
            "client created"
        );
        Ok(Self {
            inner: Arc::new(ClientInner {
                config: ArcSwap::from_pointee(config),
                cache: ApiCache::new(),
                contexts: ContextManager::default(),
            }),
            context: None,
            consulting: Arc::from([]),
        })
    }

    /// A handle sharing this client's state, bound to `context`.
    pub fn with_context(&self, context: Option<ContextId>) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            context,
            consulting: Arc::clone(&self.consulting),
        }
    }

    /// Whether `extension` is already answering a `tryResolveUri` further
    /// up this call stack.
    pub(crate) fn is_consulting(&self, extension: &Uri) -> bool {
        self.consulting.contains(extension)
    }

    /// A handle for calls made on behalf of `extension`. Only this call
    /// stack sees the mark; concurrent calls on other handles do not.
    pub(crate) fn consulting(&self, extension: &Uri) -> Self {
        let mut chain = self.consulting.to_vec();
        chain.push(extension.clone());
        Self {
            inner: Arc::clone(&self.inner),
            context: self.context,
            consulting: chain.into(),
        }
    }

    /// The context this handle is bound to, if any.
    pub fn context_id(&self) -> Option<ContextId> {
        self.context
    }

    /// Whether this handle reads a context overlay instead of the base.
    pub fn is_contextualized(&self) -> bool {
        self.context
            .is_some_and(|id| self.inner.contexts.contains(id))
    }

    pub fn cache(&self) -> &ApiCache {
        &self.inner.cache
    }

    // ── Configuration accessors ─────────────────────────────────────

    /// Effective configuration of the bound context.
    pub fn config(&self) -> Result<Arc<ClientConfig>, CoreError> {
        self.config_for(self.context)
    }

    pub fn redirects(&self) -> Result<Vec<UriRedirect>, CoreError> {
        Ok(self.config()?.redirects.clone())
    }

    pub fn plugins(&self) -> Result<Vec<PluginRegistration>, CoreError> {
        Ok(self.config()?.plugins.clone())
    }

    pub fn interfaces(&self) -> Result<Vec<InterfaceImplementations>, CoreError> {
        Ok(self.config()?.interfaces.clone())
    }

    pub fn envs(&self) -> Result<Vec<Env>, CoreError> {
        Ok(self.config()?.envs.clone())
    }

    pub fn resolvers(&self) -> Result<Vec<ResolverHandle>, CoreError> {
        Ok(self.config()?.resolvers.clone())
    }

    pub fn env_by_uri(&self, uri: &Uri) -> Result<Option<Env>, CoreError> {
        Ok(self.config()?.env_by_uri(uri).cloned())
    }

    pub fn tracing_enabled(&self) -> Result<bool, CoreError> {
        Ok(self.config()?.tracing_enabled)
    }

    /// Toggle tracing spans on the base configuration. Live contexts keep
    /// the value they were created with.
    pub fn set_tracing_enabled(&self, enabled: bool) {
        self.inner.config.rcu(|current| {
            let mut next = ClientConfig::clone(current);
            next.tracing_enabled = enabled;
            next
        });
        debug!(enabled, "tracing toggled");
    }

    /// Every Uri registered as implementing `interface`.
    pub fn implementations(
        &self,
        interface: &Uri,
        apply_redirects: bool,
    ) -> Result<Vec<Uri>, CoreError> {
        let config = self.config()?;
        let redirects = apply_redirects.then_some(config.redirects.as_slice());
        Ok(implementations_of(interface, &config.interfaces, redirects))
    }

    // ── Resolution ──────────────────────────────────────────────────

    /// Walk the resolver chain for `uri`.
    ///
    /// Resolution failures are reported in [`UriResolution::error`]; the
    /// `Err` side is reserved for context problems.
    pub async fn resolve_uri(
        &self,
        uri: &Uri,
        options: ResolveUriOptions,
    ) -> Result<UriResolution, CoreError> {
        let guard = self.enter(options.context_id, options.config)?;
        let context = guard.id();
        let span = self.span(context, || info_span!("resolve_uri", %uri));

        let result = self
            .resolve_in(uri, context, options.no_cache_read, options.no_cache_write)
            .instrument(span)
            .await;
        guard.release();
        result
    }

    // ── Invocation ──────────────────────────────────────────────────

    /// Resolve the Uri and call one method on the Api found there.
    pub async fn invoke(&self, options: InvokeOptions) -> Result<Value, CoreError> {
        let guard = self.enter(options.context_id, options.config)?;
        let context = guard.id();
        let span = self.span(context, || {
            info_span!("invoke", uri = %options.uri, method = %options.method)
        });

        let result = self
            .invoke_in(&options.uri, &options.method, options.args, context)
            .instrument(span)
            .await;
        guard.release();
        result
    }

    /// Run every invocation of a query document concurrently and merge
    /// the results. Never fails as a whole: problems land in `errors`.
    pub async fn query(&self, options: QueryOptions) -> QueryResult {
        let guard = match self.enter(options.context_id, options.config) {
            Ok(guard) => guard,
            Err(err) => return QueryResult::failed(err),
        };
        let document = match options.query.into_document() {
            Ok(document) => document,
            Err(err) => return QueryResult::failed(err),
        };

        let context = guard.id();
        let span = self.span(context, || info_span!("query", uri = %options.uri));
        let result = self
            .query_in(&options.uri, &document, &options.variables, context)
            .instrument(span)
            .await;
        guard.release();
        result
    }

    /// Start a recurring query. The call context lives as long as the
    /// subscription and is released by [`Subscription::stop`] or when its
    /// result stream ends.
    pub fn subscribe(&self, options: SubscribeOptions) -> Result<Subscription, CoreError> {
        let document = options.query.into_document()?;
        let guard = self.enter(options.context_id, options.config)?;
        let frequency = options.frequency.unwrap_or_default();
        debug!(
            uri = %options.uri,
            interval_ms = frequency.interval().as_millis(),
            context = ?guard.id(),
            "subscription created"
        );

        Ok(Subscription::new(
            self.with_context(guard.id()),
            guard,
            options.uri,
            document,
            options.variables,
            frequency,
        ))
    }

    // ── Api accessors ───────────────────────────────────────────────

    /// The schema of the Api at `uri`.
    pub async fn schema(&self, uri: &Uri) -> Result<String, CoreError> {
        let api = self.load_api(uri, self.context).await?;
        api.schema(uri, self).await
    }

    pub async fn manifest(&self, uri: &Uri, options: &ManifestOptions) -> Result<Value, CoreError> {
        let api = self.load_api(uri, self.context).await?;
        api.manifest(uri, options, self).await
    }

    /// A file packaged with the Api at `uri`.
    pub async fn file(&self, uri: &Uri, options: &FileOptions) -> Result<FileContent, CoreError> {
        let api = self.load_api(uri, self.context).await?;
        api.file(uri, options, self).await
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Calls without an explicit parent inherit the handle's own context.
    fn enter(
        &self,
        parent: Option<ContextId>,
        overrides: Option<ConfigOverride>,
    ) -> Result<ContextGuard, CoreError> {
        let base = self.inner.config.load();
        self.inner
            .contexts
            .enter(parent.or(self.context), overrides, &base)
    }

    fn config_for(&self, context: Option<ContextId>) -> Result<Arc<ClientConfig>, CoreError> {
        match context {
            Some(id) => self.inner.contexts.get(id),
            None => Ok(self.inner.config.load_full()),
        }
    }

    fn span(&self, context: Option<ContextId>, make: impl FnOnce() -> Span) -> Span {
        let enabled = self
            .config_for(context)
            .is_ok_and(|config| config.tracing_enabled);
        if enabled { make() } else { Span::none() }
    }

    async fn resolve_in(
        &self,
        uri: &Uri,
        context: Option<ContextId>,
        no_cache_read: bool,
        no_cache_write: bool,
    ) -> Result<UriResolution, CoreError> {
        let config = self.config_for(context)?;
        // Overlays never read from or write to the shared cache.
        let shared = context.is_none();
        let read_cache = shared && !no_cache_read;
        let write_cache = shared && !no_cache_write;

        let resolvers: Vec<ResolverHandle> = if read_cache {
            config.resolvers.clone()
        } else {
            config
                .resolvers
                .iter()
                .filter(|r| r.name() != CacheResolver::NAME)
                .cloned()
                .collect()
        };

        let client = self.with_context(context);
        let cx = ResolveContext {
            client: &client,
            config: &config,
            cache: &self.inner.cache,
        };
        let resolution = resolution::resolve_uri(uri.clone(), &resolvers, &cx).await;

        if write_cache {
            if let Some(api) = &resolution.api {
                self.memoize(&resolution, api);
            }
        }
        Ok(resolution)
    }

    /// Write every source Uri on the resolution path to the cache.
    fn memoize(&self, resolution: &UriResolution, api: &ApiHandle) {
        for step in resolution.history.resolution_path().steps() {
            if self
                .inner
                .cache
                .insert(&step.source_uri, Arc::clone(api))
            {
                debug!(uri = %step.source_uri, "cached api");
            }
        }
    }

    async fn load_api(&self, uri: &Uri, context: Option<ContextId>) -> Result<ApiHandle, CoreError> {
        let resolution = self.resolve_in(uri, context, false, false).await?;
        let UriResolution {
            api,
            uri: last,
            history,
            error,
        } = resolution;

        match (api, error) {
            (Some(api), _) => Ok(api),
            (None, Some(ResolveUriError::InfiniteLoop)) => {
                Err(CoreError::InfiniteLoop { uri: last, history })
            }
            (None, _) => Err(CoreError::NotFound {
                uri: uri.clone(),
                history,
            }),
        }
    }

    async fn invoke_in(
        &self,
        uri: &Uri,
        method: &str,
        args: Map<String, Value>,
        context: Option<ContextId>,
    ) -> Result<Value, CoreError> {
        let api = self.load_api(uri, context).await?;
        let env = self
            .config_for(context)?
            .env_by_uri(uri)
            .map(|e| e.bindings.clone());

        let invocation = Invocation {
            uri: uri.clone(),
            method: method.to_owned(),
            args,
            env,
        };
        let client = self.with_context(context);

        match AssertUnwindSafe(api.invoke(&invocation, &client))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(CoreError::invocation(uri, method, panic_message(&*panic))),
        }
    }

    pub(crate) async fn query_in(
        &self,
        uri: &Uri,
        document: &QueryDocument,
        variables: &Map<String, Value>,
        context: Option<ContextId>,
    ) -> QueryResult {
        let invocations = match parse_query(uri, document, variables) {
            Ok(invocations) => invocations,
            Err(err) => return QueryResult::failed(err),
        };

        let calls = invocations.into_iter().map(|(name, call)| async move {
            let outcome = self
                .invoke_in(&call.uri, &call.method, call.args, context)
                .await;
            (name, outcome)
        });

        let mut result = QueryResult::default();
        for (name, outcome) in join_all(calls).await {
            match outcome {
                Ok(value) => {
                    result.data.insert(name, value);
                }
                Err(err) => {
                    debug!(invocation = %name, error = %err, "query invocation failed");
                    result.errors.push(err);
                }
            }
        }
        result
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("context", &self.context)
            .field("cached", &self.inner.cache.len())
            .field("contexts", &self.inner.contexts.len())
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("api panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("api panicked: {s}")
    } else {
        "api panicked".to_owned()
    }
}
