#![allow(clippy::unwrap_used)]
// Integration tests for invoke / query and call-context scoping.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};

use urigate_core::{
    Api, ApiHandle, Client, ClientConfig, ConfigOverride, ContextId, CoreError, FileContent,
    FileOptions, Invocation, InvokeOptions, ManifestOptions, PluginRegistration, QueryOptions,
    SubscribeOptions, Uri,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Echoes its invocation; `forward` re-invokes another Uri through the
/// client it was handed; `panic` panics.
struct Echo;

#[async_trait]
impl Api for Echo {
    async fn invoke(&self, invocation: &Invocation, client: &Client) -> Result<Value, CoreError> {
        match invocation.method.as_str() {
            "forward" => {
                let target = Uri::parse(invocation.args["to"].as_str().unwrap_or_default())?;
                client.invoke(InvokeOptions::new(target, "echo")).await
            }
            "panic" => panic!("echo was asked to panic"),
            _ => Ok(json!({
                "method": invocation.method,
                "args": invocation.args,
                "env": invocation.env,
            })),
        }
    }

    async fn schema(&self, _: &Uri, _: &Client) -> Result<String, CoreError> {
        Ok("type Query { echo(msg: String): String }".into())
    }

    async fn file(
        &self,
        _: &Uri,
        options: &FileOptions,
        _: &Client,
    ) -> Result<FileContent, CoreError> {
        Ok(FileContent::Text(options.path.clone()))
    }
}

/// Records what its context-bound client sees during a call.
#[derive(Default)]
struct Inspector {
    seen: Mutex<Option<Observed>>,
}

#[derive(Debug, Clone)]
struct Observed {
    context: Option<ContextId>,
    redirects: usize,
    interfaces: usize,
    envs: usize,
    resolvers: Vec<String>,
    plugins: Vec<String>,
}

struct InspectorApi(Arc<Inspector>);

#[async_trait]
impl Api for InspectorApi {
    async fn invoke(&self, _: &Invocation, client: &Client) -> Result<Value, CoreError> {
        let observed = Observed {
            context: client.context_id(),
            redirects: client.redirects()?.len(),
            interfaces: client.interfaces()?.len(),
            envs: client.envs()?.len(),
            resolvers: client
                .resolvers()?
                .iter()
                .map(|r| r.name().to_owned())
                .collect(),
            plugins: client
                .plugins()?
                .iter()
                .map(|p| p.uri.to_string())
                .collect(),
        };
        *self.0.seen.lock().unwrap() = Some(observed);
        Ok(Value::Null)
    }
}

fn uri(raw: &str) -> Uri {
    Uri::parse(raw).unwrap()
}

fn echo() -> ApiHandle {
    Arc::new(Echo)
}

fn bindings(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn base_client() -> Client {
    let config = ClientConfig::builder()
        .redirect("ens/old.eth", "ens/echo.eth")
        .plugin("ens/echo.eth", echo)
        .interface("ens/iface.eth", ["ens/echo.eth"])
        .env("ens/echo.eth", bindings(json!({ "apiKey": "k-123" })))
        .build()
        .unwrap();
    Client::new(config).unwrap()
}

// ── invoke ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_invoke_passes_args_and_env() {
    let client = base_client();

    let value = client
        .invoke(InvokeOptions::new(uri("ens/echo.eth"), "greet").arg("name", "ada"))
        .await
        .unwrap();

    assert_eq!(
        value,
        json!({
            "method": "greet",
            "args": { "name": "ada" },
            "env": { "apiKey": "k-123" },
        })
    );
}

#[tokio::test]
async fn test_invoke_through_redirect_uses_addressed_env() {
    let client = base_client();

    let value = client
        .invoke(InvokeOptions::new(uri("ens/old.eth"), "greet"))
        .await
        .unwrap();

    assert_eq!(value["env"], Value::Null);
}

#[tokio::test]
async fn test_api_panic_becomes_invocation_error() {
    let client = base_client();

    let err = client
        .invoke(InvokeOptions::new(uri("ens/echo.eth"), "panic"))
        .await
        .unwrap_err();

    match err {
        CoreError::InvocationFailed { method, message, .. } => {
            assert_eq!(method, "panic");
            assert!(message.contains("asked to panic"), "{message}");
        }
        other => panic!("expected InvocationFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_parent_context_is_rejected() {
    let client = base_client();
    let stale: ContextId = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();

    let err = client
        .invoke(InvokeOptions::new(uri("ens/echo.eth"), "greet").context_id(stale))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::ContextNotFound { id } if id == stale));
}

// ── query ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_query_collects_partial_failures() {
    let client = base_client();

    let result = client
        .query(QueryOptions::new(
            uri("ens/echo.eth"),
            r#"query {
                ok: echo(msg: "hi")
                broken: forward(to: "ens/missing.eth")
            }"#,
        ))
        .await;

    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data["ok"]["args"], json!({ "msg": "hi" }));
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(result.errors[0], CoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_query_preserves_document_order() {
    let client = base_client();

    let result = client
        .query(
            QueryOptions::new(
                uri("ens/iface.eth"),
                "query ($n: Int) { z: echo(n: $n) a: echo(n: 2) m: echo }",
            )
            .variable("n", 1),
        )
        .await;

    assert!(result.is_ok(), "{:?}", result.errors);
    let keys: Vec<&str> = result.data.keys().map(String::as_str).collect();
    assert_eq!(keys, ["z", "a", "m"]);
    assert_eq!(result.data["z"]["args"]["n"], json!(1));
}

/// Takes a second to answer every invocation.
struct Sleepy;

#[async_trait]
impl Api for Sleepy {
    async fn invoke(&self, invocation: &Invocation, _: &Client) -> Result<Value, CoreError> {
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        Ok(json!(invocation.method))
    }
}

#[tokio::test(start_paused = true)]
async fn test_query_invocations_run_concurrently() {
    let config = ClientConfig::builder()
        .plugin("ens/slow.eth", || -> ApiHandle { Arc::new(Sleepy) })
        .build()
        .unwrap();
    let client = Client::new(config).unwrap();

    let started = tokio::time::Instant::now();
    let result = client
        .query(QueryOptions::new(uri("ens/slow.eth"), "{ a: first b: second }"))
        .await;
    let elapsed = started.elapsed();

    assert!(result.is_ok(), "{:?}", result.errors);
    assert_eq!(result.data["a"], json!("first"));
    assert_eq!(result.data["b"], json!("second"));
    assert!(elapsed >= std::time::Duration::from_secs(1), "{elapsed:?}");
    assert!(elapsed < std::time::Duration::from_millis(1500), "{elapsed:?}");
}

#[tokio::test]
async fn test_query_parse_errors_are_returned_as_values() {
    let client = base_client();

    let result = client
        .query(QueryOptions::new(uri("ens/echo.eth"), "query { echo("))
        .await;
    assert!(result.data.is_empty());
    assert!(matches!(result.errors.as_slice(), [CoreError::QueryParse { .. }]));

    let result = client
        .query(QueryOptions::new(uri("ens/echo.eth"), "{ echo(msg: $missing) }"))
        .await;
    assert!(matches!(result.errors.as_slice(), [CoreError::MissingVariable { .. }]));
}

#[test]
fn test_subscribe_rejects_bad_documents_eagerly() {
    let client = base_client();
    let err = client
        .subscribe(SubscribeOptions::new(uri("ens/echo.eth"), "query { a: }"))
        .err()
        .unwrap();
    assert!(matches!(err, CoreError::QueryParse { .. }));
}

// ── Contexts ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_plugins_only_override_inherits_everything_else() {
    let inspector = Arc::new(Inspector::default());
    let client = base_client();
    let base_resolvers: Vec<String> = client
        .resolvers()
        .unwrap()
        .iter()
        .map(|r| r.name().to_owned())
        .collect();

    let observer = Arc::clone(&inspector);
    let overrides = ConfigOverride::default().with_plugins(vec![PluginRegistration::new(
        uri("ens/inspect.eth"),
        move || Arc::new(InspectorApi(Arc::clone(&observer))) as ApiHandle,
    )]);

    client
        .invoke(InvokeOptions::new(uri("ens/inspect.eth"), "look").config(overrides))
        .await
        .unwrap();

    let seen = inspector.seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen.redirects, 1);
    assert_eq!(seen.interfaces, 1);
    assert_eq!(seen.envs, 1);
    assert_eq!(seen.resolvers, base_resolvers);
    assert_eq!(seen.plugins, ["w3://ens/inspect.eth"]);

    // The override is gone once the owning call returns.
    let context = seen.context.unwrap();
    assert!(matches!(
        client.with_context(Some(context)).config(),
        Err(CoreError::ContextNotFound { .. })
    ));
    let base_plugins: Vec<String> = client
        .plugins()
        .unwrap()
        .iter()
        .map(|p| p.uri.to_string())
        .collect();
    assert_eq!(base_plugins, ["w3://ens/echo.eth"]);
}

#[tokio::test]
async fn test_nested_calls_inherit_the_callers_context() {
    let client = base_client();
    let overrides = ConfigOverride::default().with_plugins(vec![
        PluginRegistration::new(uri("ens/echo.eth"), echo),
        PluginRegistration::new(uri("ens/inner.eth"), echo),
    ]);

    let value = client
        .invoke(
            InvokeOptions::new(uri("ens/echo.eth"), "forward")
                .arg("to", "ens/inner.eth")
                .config(overrides),
        )
        .await
        .unwrap();
    assert_eq!(value["method"], json!("echo"));

    // Without the override the inner plugin does not exist.
    let err = client
        .invoke(InvokeOptions::new(uri("ens/echo.eth"), "forward").arg("to", "ens/inner.eth"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_override_clashing_plugins_and_interfaces_is_rejected() {
    let client = base_client();
    let overrides = ConfigOverride::default()
        .with_plugins(vec![PluginRegistration::new(uri("ens/iface.eth"), echo)]);

    let err = client
        .invoke(InvokeOptions::new(uri("ens/iface.eth"), "greet").config(overrides))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ConfigValidation { .. }));
}

// ── Configuration accessors ─────────────────────────────────────────

#[test]
fn test_implementations_with_and_without_redirects() {
    let config = ClientConfig::builder()
        .redirect("ens/legacy-iface.eth", "ens/iface.eth")
        .redirect("ens/impl-b.eth", "ens/impl-c.eth")
        .interface("ens/iface.eth", ["ens/impl-a.eth"])
        .interface("ens/legacy-iface.eth", ["ens/impl-b.eth"])
        .build()
        .unwrap();
    let client = Client::new(config).unwrap();
    let iface = uri("ens/iface.eth");

    assert_eq!(
        client.implementations(&iface, false).unwrap(),
        [uri("ens/impl-a.eth")]
    );
    assert_eq!(
        client.implementations(&iface, true).unwrap(),
        [uri("ens/impl-a.eth"), uri("ens/impl-c.eth")]
    );
}

#[test]
fn test_set_tracing_enabled_updates_base_config() {
    let client = base_client();
    assert!(!client.tracing_enabled().unwrap());

    client.set_tracing_enabled(true);
    assert!(client.tracing_enabled().unwrap());
    assert!(client.clone().tracing_enabled().unwrap());
}

#[test]
fn test_env_by_uri() {
    let client = base_client();
    let env = client.env_by_uri(&uri("ens/echo.eth")).unwrap().unwrap();
    assert_eq!(env.bindings["apiKey"], json!("k-123"));
    assert!(client.env_by_uri(&uri("ens/other.eth")).unwrap().is_none());
}

// ── Api accessors ───────────────────────────────────────────────────

#[tokio::test]
async fn test_schema_manifest_and_file() {
    let client = base_client();
    let target = uri("ens/old.eth");

    let schema = client.schema(&target).await.unwrap();
    assert!(schema.contains("type Query"));

    let file = client
        .file(
            &target,
            &FileOptions {
                path: "meta/icon.png".into(),
                encoding: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(file, FileContent::Text("meta/icon.png".into()));

    let err = client
        .manifest(&target, &ManifestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Unsupported { .. }));
}
