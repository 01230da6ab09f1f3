//! Remote key-value document backends
//!
//! A store holds one room document and offers whole-value reads and
//! writes plus shallow merges on two levels: the room root and a player
//! subtree. That is the subset of the Firebase REST surface the match
//! protocol needs, so every backend can offer it.

mod http;
mod memory;
mod zenoh_store;

pub use http::HttpStore;
pub use memory::{Document, MemoryStore};
pub use zenoh_store::{RoomHost, RoomHostBuilder, SessionExt, ZenohStore, DEFAULT_PREFIX};

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::types::Role;

/// Location inside the room document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocPath {
    Room,
    Player(Role),
}

impl DocPath {
    /// Path relative to the room, empty for the room itself
    pub fn as_str(&self) -> &'static str {
        match self {
            DocPath::Room => "",
            DocPath::Player(role) => role.slot(),
        }
    }

    pub fn parse(s: &str) -> Option<DocPath> {
        if s.is_empty() {
            Some(DocPath::Room)
        } else {
            Role::from_slot(s).map(DocPath::Player)
        }
    }
}

impl std::fmt::Display for DocPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocPath::Room => write!(f, "/"),
            DocPath::Player(role) => write!(f, "/{}", role),
        }
    }
}

/// Asynchronous access to one room document
///
/// `get` returns `None` for an absent value. `patch` merges the given
/// fields into the object at `path`, creating it if needed; a `null`
/// field removes the key.
pub trait MatchStore: Send + Sync {
    fn get(&self, path: DocPath) -> BoxFuture<'_, Result<Option<Value>>>;

    fn put(&self, path: DocPath, value: Value) -> BoxFuture<'_, Result<()>>;

    fn patch(&self, path: DocPath, fields: Map<String, Value>) -> BoxFuture<'_, Result<()>>;
}

/// Turn a `json!({...})` object into patch fields; anything else is empty
pub fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
