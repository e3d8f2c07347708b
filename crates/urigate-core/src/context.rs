// ── Call contexts ──
//
// Short-lived configuration overlays keyed by a generated id. A call
// either inherits the context it was handed or creates its own; only
// the creator removes it, when its `ContextGuard` is released or dropped.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::{ClientConfig, ConfigOverride};
use crate::error::CoreError;

// ── ContextId ───────────────────────────────────────────────────────

/// Identifier of a live call context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(Uuid);

impl ContextId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContextId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ── ContextManager ──────────────────────────────────────────────────

/// Map of live contexts. Cheaply cloneable; clones share the map.
#[derive(Clone, Default)]
pub(crate) struct ContextManager {
    contexts: Arc<DashMap<ContextId, Arc<ClientConfig>>>,
}

impl ContextManager {
    pub(crate) fn get(&self, id: ContextId) -> Result<Arc<ClientConfig>, CoreError> {
        self.contexts
            .get(&id)
            .map(|r| Arc::clone(r.value()))
            .ok_or(CoreError::ContextNotFound { id })
    }

    pub(crate) fn contains(&self, id: ContextId) -> bool {
        self.contexts.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Establish the context for a call.
    ///
    /// | parent | overrides | result                                   |
    /// |--------|-----------|------------------------------------------|
    /// | no     | no        | no context, base configuration           |
    /// | yes    | no        | parent's context, not owned              |
    /// | no     | yes       | new owned context seeded from base       |
    /// | yes    | yes       | new owned context seeded from the parent |
    pub(crate) fn enter(
        &self,
        parent: Option<ContextId>,
        overrides: Option<ConfigOverride>,
        base: &ClientConfig,
    ) -> Result<ContextGuard, CoreError> {
        let Some(overrides) = overrides else {
            if let Some(id) = parent {
                // Fail early rather than on the first config lookup.
                self.get(id)?;
            }
            return Ok(ContextGuard::inherited(parent));
        };

        let config = match parent {
            Some(id) => overrides.apply_to(&*self.get(id)?),
            None => overrides.apply_to(base),
        };
        config.validate()?;

        let id = ContextId::generate();
        self.contexts.insert(id, Arc::new(config));
        debug!(context = %id, parent = ?parent, "context created");

        Ok(ContextGuard {
            id: Some(id),
            owner: Some(self.clone()),
            released: AtomicBool::new(false),
        })
    }

    fn remove(&self, id: ContextId) {
        if self.contexts.remove(&id).is_some() {
            debug!(context = %id, "context released");
        }
    }
}

// ── ContextGuard ────────────────────────────────────────────────────

/// Scope of one call's context.
///
/// Owned contexts are removed on [`release()`](Self::release) or drop,
/// whichever comes first; inherited ones are left alone.
pub struct ContextGuard {
    id: Option<ContextId>,
    owner: Option<ContextManager>,
    released: AtomicBool,
}

impl ContextGuard {
    fn inherited(id: Option<ContextId>) -> Self {
        Self {
            id,
            owner: None,
            released: AtomicBool::new(false),
        }
    }

    /// The context the call runs under; `None` means the base configuration.
    pub fn id(&self) -> Option<ContextId> {
        self.id
    }

    /// Whether this call created the context and will tear it down.
    pub fn is_owner(&self) -> bool {
        self.owner.is_some()
    }

    /// Remove an owned context now. Idempotent.
    pub fn release(&self) {
        if let (Some(owner), Some(id)) = (&self.owner, self.id) {
            if !self.released.swap(true, Ordering::AcqRel) {
                owner.remove(id);
            }
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard")
            .field("id", &self.id)
            .field("owner", &self.is_owner())
            .field("released", &self.released.load(Ordering::Acquire))
            .finish()
    }
}
