// ── Api cache ──
//
// Uri -> resolved Api, shared by every call on a client. Written after
// successful resolutions, never expired. Keys are normalized Uri strings.

use std::sync::Arc;

use dashmap::DashMap;

use crate::api::ApiHandle;
use crate::uri::Uri;

/// Lock-free memo of resolved Apis.
///
/// Cheaply cloneable; clones share the same entries.
#[derive(Clone, Default)]
pub struct ApiCache {
    entries: Arc<DashMap<String, ApiHandle>>,
}

impl ApiCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uri: &Uri) -> Option<ApiHandle> {
        self.entries.get(uri.as_str()).map(|r| Arc::clone(r.value()))
    }

    /// Insert or overwrite. Returns `true` if the Uri now maps to a
    /// different handle than before (including when it was absent).
    pub fn insert(&self, uri: &Uri, api: ApiHandle) -> bool {
        let previous = self.entries.insert(uri.as_str().to_owned(), Arc::clone(&api));
        previous.is_none_or(|old| !Arc::ptr_eq(&old, &api))
    }

    pub fn contains(&self, uri: &Uri) -> bool {
        self.entries.contains_key(uri.as_str())
    }

    pub fn remove(&self, uri: &Uri) -> Option<ApiHandle> {
        self.entries.remove(uri.as_str()).map(|(_, v)| v)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All cached Uri strings, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }
}
