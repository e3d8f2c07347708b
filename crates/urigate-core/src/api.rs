// ── Api capability ──
//
// The invokable target a resolution ends in. Plugins, module loaders and
// interface shims all implement `Api`; the engine only ever holds a
// shared handle and never looks inside payloads.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::Client;
use crate::error::CoreError;
use crate::uri::Uri;

/// Shared handle to a resolved Api. Cache entries and resolution results
/// all point at the same instance.
pub type ApiHandle = Arc<dyn Api>;

/// A single method call routed into an [`Api`].
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// The Uri the caller addressed (before any redirect).
    pub uri: Uri,
    pub method: String,
    pub args: Map<String, Value>,
    /// Env bindings registered for `uri`, if any.
    pub env: Option<Map<String, Value>>,
}

/// Which manifest document to fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestType {
    #[default]
    Web3Api,
    Meta,
    Build,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestOptions {
    pub manifest_type: ManifestType,
    pub no_validate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOptions {
    pub path: String,
    /// When set, the file is returned as text in this encoding.
    pub encoding: Option<String>,
}

/// Contents of a file packaged with an Api.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Bytes(Bytes),
}

/// An invokable capability.
///
/// Only [`invoke`](Api::invoke) is mandatory. The client handed to every
/// method is bound to the caller's context, so nested calls made from inside
/// an Api see the same configuration as the call that reached it.
#[async_trait]
pub trait Api: Send + Sync {
    async fn invoke(&self, invocation: &Invocation, client: &Client) -> Result<Value, CoreError>;

    async fn schema(&self, uri: &Uri, _client: &Client) -> Result<String, CoreError> {
        Err(unsupported("getSchema", uri))
    }

    async fn manifest(
        &self,
        uri: &Uri,
        _options: &ManifestOptions,
        _client: &Client,
    ) -> Result<Value, CoreError> {
        Err(unsupported("getManifest", uri))
    }

    async fn file(
        &self,
        uri: &Uri,
        _options: &FileOptions,
        _client: &Client,
    ) -> Result<FileContent, CoreError> {
        Err(unsupported("getFile", uri))
    }
}

impl fmt::Debug for dyn Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Api")
    }
}

fn unsupported(operation: &str, uri: &Uri) -> CoreError {
    CoreError::Unsupported {
        operation: operation.into(),
        uri: uri.clone(),
    }
}
