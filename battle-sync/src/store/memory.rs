use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};

use super::{DocPath, MatchStore};
use crate::error::{Result, SyncError};

/// A room document held in memory, with the store merge semantics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    root: Value,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn get(&self, path: DocPath) -> Option<Value> {
        let value = match path {
            DocPath::Room => &self.root,
            DocPath::Player(role) => self.root.get(role.slot())?,
        };
        if value.is_null() {
            None
        } else {
            Some(value.clone())
        }
    }

    pub fn put(&mut self, path: DocPath, value: Value) {
        match path {
            DocPath::Room => self.root = value,
            DocPath::Player(role) => {
                Self::object(&mut self.root).insert(role.slot().to_string(), value);
            }
        }
    }

    pub fn patch(&mut self, path: DocPath, fields: Map<String, Value>) {
        let target = match path {
            DocPath::Room => Self::object(&mut self.root),
            DocPath::Player(role) => {
                let room = Self::object(&mut self.root);
                let slot = room.entry(role.slot()).or_insert(Value::Null);
                Self::object(slot)
            }
        };
        for (key, value) in fields {
            if value.is_null() {
                target.remove(&key);
            } else {
                target.insert(key, value);
            }
        }
    }

    // Replace non-objects with an empty object and borrow it
    fn object(value: &mut Value) -> &mut Map<String, Value> {
        if !value.is_object() {
            *value = Value::Object(Map::new());
        }
        match value {
            Value::Object(map) => map,
            _ => unreachable!("value was just made an object"),
        }
    }
}

/// In-process store shared by clones; both players of a local duel hold one
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    document: Arc<Mutex<Document>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every request fails with a transport error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Copy of the current document
    pub fn snapshot(&self) -> Result<Document> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Document>> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(SyncError::Transport("memory store is offline".to_string()));
        }
        self.document
            .lock()
            .map_err(|_| SyncError::Internal("memory store lock poisoned".to_string()))
    }
}

impl MatchStore for MemoryStore {
    fn get(&self, path: DocPath) -> BoxFuture<'_, Result<Option<Value>>> {
        async move { Ok(self.lock()?.get(path)) }.boxed()
    }

    fn put(&self, path: DocPath, value: Value) -> BoxFuture<'_, Result<()>> {
        async move {
            self.lock()?.put(path, value);
            Ok(())
        }
        .boxed()
    }

    fn patch(&self, path: DocPath, fields: Map<String, Value>) -> BoxFuture<'_, Result<()>> {
        async move {
            self.lock()?.patch(path, fields);
            Ok(())
        }
        .boxed()
    }
}
