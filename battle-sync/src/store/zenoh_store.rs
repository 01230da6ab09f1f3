//! Room document served over zenoh query/reply
//!
//! ## Protocol
//!
//! A [`RoomHost`] declares one queryable on `<prefix>/room/<room>` and keeps
//! the document in memory. Every store operation is a single query on that
//! key with a [`StoreRequest`] payload:
//!
//! - `get`: body empty, reply carries the JSON value (`null` when absent)
//! - `put`: body is the JSON value, reply is empty
//! - `patch`: body is a JSON object of fields, reply is empty
//!
//! Failures are answered with `reply_err` carrying a readable reason.
//! Requests are applied in arrival order, so the host is the single point
//! of serialization for the room.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};
use zenoh::handlers::FifoChannelHandler;
use zenoh::key_expr::KeyExpr;
use zenoh::query::{Query, Queryable};
use zenoh::Resolvable;

use super::{DocPath, Document, MatchStore};
use crate::error::{Result, SyncError};
use crate::types::RoomId;

/// Default key expression prefix for rooms
pub const DEFAULT_PREFIX: &str = "mario/battle";

fn room_keyexpr(prefix: &KeyExpr<'static>, room: &RoomId) -> Result<KeyExpr<'static>> {
    Ok(KeyExpr::try_from(format!("{}/room/{}", prefix, room))?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreOp {
    Get,
    Put,
    Patch,
}

/// One store operation as sent to the room host
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRequest {
    op: StoreOp,
    path: DocPath,
    body: String,
}

impl zenoh_ext::Serialize for StoreRequest {
    fn serialize(&self, serializer: &mut zenoh_ext::ZSerializer) {
        let op_byte = match self.op {
            StoreOp::Get => 0u8,
            StoreOp::Put => 1u8,
            StoreOp::Patch => 2u8,
        };
        op_byte.serialize(serializer);
        self.path.as_str().to_string().serialize(serializer);
        self.body.serialize(serializer);
    }
}

impl zenoh_ext::Deserialize for StoreRequest {
    fn deserialize(
        deserializer: &mut zenoh_ext::ZDeserializer,
    ) -> std::result::Result<Self, zenoh_ext::ZDeserializeError> {
        let op = match u8::deserialize(deserializer)? {
            0 => StoreOp::Get,
            1 => StoreOp::Put,
            2 => StoreOp::Patch,
            _ => return Err(zenoh_ext::ZDeserializeError),
        };
        let path = String::deserialize(deserializer)?;
        let path = DocPath::parse(&path).ok_or(zenoh_ext::ZDeserializeError)?;
        let body = String::deserialize(deserializer)?;
        Ok(StoreRequest { op, path, body })
    }
}

/// Queryable owner of one room document
pub struct RoomHost {
    queryable: Queryable<FifoChannelHandler<Query>>,
    keyexpr: KeyExpr<'static>,
    document: Document,
}

impl RoomHost {
    pub(crate) async fn declare(
        session: &zenoh::Session,
        prefix: Option<KeyExpr<'static>>,
        room: RoomId,
    ) -> Result<Self> {
        let prefix = match prefix {
            Some(prefix) => prefix,
            None => KeyExpr::try_from(DEFAULT_PREFIX)?,
        };
        let keyexpr = room_keyexpr(&prefix, &room)?;
        let queryable = session.declare_queryable(&keyexpr).await?;
        tracing::info!("Room host '{}' serving on {}", room, keyexpr);
        Ok(Self {
            queryable,
            keyexpr,
            document: Document::new(),
        })
    }

    pub fn keyexpr(&self) -> &KeyExpr<'static> {
        &self.keyexpr
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Answer requests until the queryable is dropped
    pub async fn serve(mut self) -> Result<()> {
        while let Ok(query) = self.queryable.recv_async().await {
            self.handle(query).await;
        }
        tracing::debug!("Room host on {} stopped", self.keyexpr);
        Ok(())
    }

    async fn handle(&mut self, query: Query) {
        let request = match query.payload() {
            Some(payload) => zenoh_ext::z_deserialize::<StoreRequest>(payload)
                .map_err(|_| SyncError::Serialization("Malformed store request".to_string())),
            None => Err(SyncError::Serialization(
                "Store request without payload".to_string(),
            )),
        };
        let keyexpr = query.key_expr().clone();
        let sent = match request.and_then(|request| self.apply(request)) {
            Ok(body) => query.reply(keyexpr, zenoh_ext::z_serialize(&body)).await,
            Err(e) => {
                tracing::debug!("Room host rejected request: {}", e);
                query.reply_err(e.to_string()).await
            }
        };
        if let Err(e) = sent {
            tracing::debug!("Failed to reply to store request: {}", e);
        }
    }

    fn apply(&mut self, request: StoreRequest) -> Result<String> {
        match request.op {
            StoreOp::Get => {
                let value = self.document.get(request.path).unwrap_or(Value::Null);
                Ok(serde_json::to_string(&value)?)
            }
            StoreOp::Put => {
                let value: Value = serde_json::from_str(&request.body)?;
                self.document.put(request.path, value);
                Ok(String::new())
            }
            StoreOp::Patch => {
                let fields: Map<String, Value> = serde_json::from_str(&request.body)?;
                self.document.patch(request.path, fields);
                Ok(String::new())
            }
        }
    }
}

/// Extension trait for zenoh::Session to host a room
pub trait SessionExt {
    /// Declare the queryable that owns a room document
    ///
    /// # Example
    /// ```no_run
    /// use battle_sync::{RoomId, SessionExt};
    ///
    /// # async fn example() {
    /// let session = zenoh::open(zenoh::Config::default()).await.unwrap();
    /// let room = RoomId::generate();
    /// let host = session.declare_room_host(room).await.unwrap();
    /// tokio::spawn(host.serve());
    /// # }
    /// ```
    fn declare_room_host(&self, room: RoomId) -> RoomHostBuilder<'_>;
}

impl SessionExt for zenoh::Session {
    fn declare_room_host(&self, room: RoomId) -> RoomHostBuilder<'_> {
        RoomHostBuilder {
            session: self,
            room,
            prefix: None,
        }
    }
}

/// Builder for room hosts
#[must_use = "Resolvables do nothing unless you resolve them using `.await` or `zenoh::Wait::wait`"]
pub struct RoomHostBuilder<'a> {
    session: &'a zenoh::Session,
    room: RoomId,
    prefix: Option<KeyExpr<'static>>,
}

impl<'a> RoomHostBuilder<'a> {
    /// Set the key expression prefix
    pub fn prefix(mut self, prefix: KeyExpr<'static>) -> Self {
        self.prefix = Some(prefix);
        self
    }
}

impl<'a> Resolvable for RoomHostBuilder<'a> {
    type To = Result<RoomHost>;
}

impl<'a> std::future::IntoFuture for RoomHostBuilder<'a> {
    type Output = <Self as Resolvable>::To;
    type IntoFuture =
        std::pin::Pin<Box<dyn std::future::Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { RoomHost::declare(self.session, self.prefix, self.room).await })
    }
}

/// Store that forwards every operation to a [`RoomHost`]
#[derive(Clone)]
pub struct ZenohStore {
    session: zenoh::Session,
    keyexpr: KeyExpr<'static>,
    timeout: Duration,
}

impl ZenohStore {
    pub fn new(
        session: zenoh::Session,
        prefix: KeyExpr<'static>,
        room: &RoomId,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            session,
            keyexpr: room_keyexpr(&prefix, room)?,
            timeout,
        })
    }

    async fn request(&self, op: StoreOp, path: DocPath, body: String) -> Result<String> {
        let request = StoreRequest { op, path, body };
        let replies = self
            .session
            .get(self.keyexpr.clone())
            .payload(zenoh_ext::z_serialize(&request))
            .timeout(self.timeout)
            .await?;

        let reply = replies.recv_async().await.map_err(|_| {
            SyncError::Timeout(format!("No room host answered on {}", self.keyexpr))
        })?;
        match reply.result() {
            Ok(sample) => zenoh_ext::z_deserialize::<String>(sample.payload())
                .map_err(|_| SyncError::Serialization("Malformed store reply".to_string())),
            Err(err) => {
                let reason = err
                    .payload()
                    .try_to_string()
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| "unreadable error reply".to_string());
                Err(SyncError::Transport(reason))
            }
        }
    }
}

impl MatchStore for ZenohStore {
    fn get(&self, path: DocPath) -> BoxFuture<'_, Result<Option<Value>>> {
        async move {
            let body = self.request(StoreOp::Get, path, String::new()).await?;
            let value: Value = serde_json::from_str(&body)?;
            Ok(if value.is_null() { None } else { Some(value) })
        }
        .boxed()
    }

    fn put(&self, path: DocPath, value: Value) -> BoxFuture<'_, Result<()>> {
        async move {
            let body = serde_json::to_string(&value)?;
            self.request(StoreOp::Put, path, body).await?;
            Ok(())
        }
        .boxed()
    }

    fn patch(&self, path: DocPath, fields: Map<String, Value>) -> BoxFuture<'_, Result<()>> {
        async move {
            let body = serde_json::to_string(&fields)?;
            self.request(StoreOp::Patch, path, body).await?;
            Ok(())
        }
        .boxed()
    }
}
