//! Per-call session state
//!
//! The store is keyed by the engine-assigned `CallId`, never by connection
//! or process. A scope is opened when a call context is built and released
//! when the context is dropped, so state written during one call is never
//! visible to another call, even for the same tool and key.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::engine::CallContext;
use crate::types::CallId;

/// Key/value scratch space for in-flight calls
#[derive(Debug, Default)]
pub struct SessionStore {
    scopes: RwLock<HashMap<CallId, HashMap<String, Value>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the scope for `call_id`; it is released when the guard drops
    pub fn open(self: &Arc<Self>, call_id: CallId) -> SessionScope {
        self.scopes.write().entry(call_id).or_default();
        SessionScope {
            call_id,
            store: Arc::clone(self),
        }
    }

    /// Read a value in the scope of `ctx`
    pub fn get(&self, ctx: &CallContext, key: &str) -> Option<Value> {
        self.get_for(ctx.call_id(), key)
    }

    /// Write a value in the scope of `ctx`
    pub fn set(&self, ctx: &CallContext, key: impl Into<String>, value: Value) {
        self.set_for(ctx.call_id(), key, value);
    }

    /// Number of scopes currently open
    pub fn live_scopes(&self) -> usize {
        self.scopes.read().len()
    }

    fn get_for(&self, call_id: CallId, key: &str) -> Option<Value> {
        self.scopes
            .read()
            .get(&call_id)
            .and_then(|scope| scope.get(key))
            .cloned()
    }

    fn set_for(&self, call_id: CallId, key: impl Into<String>, value: Value) {
        // Writes after release are dropped: the scope must not come back to life
        if let Some(scope) = self.scopes.write().get_mut(&call_id) {
            scope.insert(key.into(), value);
        }
    }

    fn remove_for(&self, call_id: CallId, key: &str) -> Option<Value> {
        self.scopes
            .write()
            .get_mut(&call_id)
            .and_then(|scope| scope.remove(key))
    }

    fn release(&self, call_id: CallId) {
        self.scopes.write().remove(&call_id);
    }
}

/// Handle to one call's session scope
///
/// Dropping the handle releases the scope and everything stored in it.
#[derive(Debug)]
pub struct SessionScope {
    call_id: CallId,
    store: Arc<SessionStore>,
}

impl SessionScope {
    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.get_for(self.call_id, key)
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.store.set_for(self.call_id, key, value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.store.remove_for(self.call_id, key)
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        self.store.release(self.call_id);
    }
}
