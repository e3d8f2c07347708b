// ── Core error types ──
//
// Every failure the engine can report. Resolution and invocation
// failures are always handed back as values at the public-operation
// boundary; nothing in here is meant to unwind through a caller.

use thiserror::Error;

use crate::context::ContextId;
use crate::resolution::ResolutionHistory;
use crate::uri::Uri;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Configuration error: {message}")]
    ConfigValidation { message: String },

    #[error("No invoke context found with id: {id}")]
    ContextNotFound { id: ContextId },

    // ── Resolution errors ────────────────────────────────────────────
    #[error("Infinite loop while resolving URI \"{uri}\"\nResolution history: {history}")]
    InfiniteLoop {
        uri: Uri,
        history: ResolutionHistory,
    },

    #[error("No API found at URI: {uri}\nResolution history: {history}")]
    NotFound {
        uri: Uri,
        history: ResolutionHistory,
    },

    // ── Invocation errors ────────────────────────────────────────────
    #[error("Invocation of '{method}' on {uri} failed: {message}")]
    InvocationFailed {
        uri: Uri,
        method: String,
        message: String,
    },

    #[error("Operation '{operation}' is not supported by the API at {uri}")]
    Unsupported { operation: String, uri: Uri },

    // ── Query document errors ────────────────────────────────────────
    #[error("Failed to parse query document: {message}")]
    QueryParse { message: String },

    #[error("Missing variable: {name}")]
    MissingVariable { name: String },

    #[error("Duplicate query name found \"{name}\". Please use GraphQL aliases that each have unique names.")]
    DuplicateInvocation { name: String },
}

impl CoreError {
    /// Shorthand for an Api reporting a failed method call.
    pub fn invocation(uri: &Uri, method: &str, message: impl Into<String>) -> Self {
        Self::InvocationFailed {
            uri: uri.clone(),
            method: method.to_owned(),
            message: message.into(),
        }
    }

    /// The resolution history attached to a resolution failure, if any.
    pub fn history(&self) -> Option<&ResolutionHistory> {
        match self {
            Self::InfiniteLoop { history, .. } | Self::NotFound { history, .. } => Some(history),
            _ => None,
        }
    }
}
