//! A request lookup for components without direct access to the request

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use crate::{HttpRequest, InvocationId};

/// Maps in-flight invocations to their requests
///
/// Writes never overwrite an existing entry and removals are idempotent.
#[derive(Default)]
pub struct HttpRequestStore {
    entries: RwLock<HashMap<InvocationId, Arc<HttpRequest>>>,
}

impl HttpRequestStore {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the request for an invocation
    ///
    /// Returns `false`, leaving the existing entry in place, if the
    /// invocation was already registered.
    pub fn set(&self, id: InvocationId, request: Arc<HttpRequest>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(id, request);
        tracing::trace!(invocation.id = %id, "request registered");
        true
    }

    /// The request registered for an invocation
    pub fn get(&self, id: InvocationId) -> Option<Arc<HttpRequest>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Removes the entry for an invocation, if present
    pub fn remove(&self, id: InvocationId) -> Option<Arc<HttpRequest>> {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if removed.is_some() {
            tracing::trace!(invocation.id = %id, "request released");
        }
        removed
    }

    /// The number of registered invocations
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no invocations are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a guard that removes the invocation's entry when dropped
    pub fn release_on_drop(self: &Arc<Self>, id: InvocationId) -> StoreGuard {
        StoreGuard {
            store: Arc::clone(self),
            id,
        }
    }
}

impl fmt::Debug for HttpRequestStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HttpRequestStore")
            .field("len", &self.len())
            .finish()
    }
}

/// Removes an invocation's store entry when dropped
#[derive(Debug)]
pub struct StoreGuard {
    store: Arc<HttpRequestStore>,
    id: InvocationId,
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        self.store.remove(self.id);
    }
}
