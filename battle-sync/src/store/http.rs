use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};

use super::{DocPath, MatchStore};
use crate::error::Result;
use crate::types::RoomId;

/// Firebase Realtime Database style REST store
///
/// Each room lives at `{base_url}/{root}/{room}.json`; player subtrees
/// are addressed as `{base_url}/{root}/{room}/{slot}.json`. A missing
/// value reads as JSON `null`.
#[derive(Debug, Clone)]
pub struct HttpStore {
    http: reqwest::Client,
    base_url: String,
    root: String,
    room: RoomId,
    auth: Option<String>,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>, room: RoomId, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            root: "battles".to_string(),
            room,
            auth: None,
        })
    }

    /// Collection the rooms live under
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    /// Database secret or ID token, sent as the `auth` query parameter
    pub fn with_auth(mut self, auth: Option<String>) -> Self {
        self.auth = auth;
        self
    }

    pub fn url(&self, path: DocPath) -> String {
        let mut url = format!("{}/{}/{}", self.base_url, self.root, self.room);
        if let DocPath::Player(role) = path {
            url.push('/');
            url.push_str(role.slot());
        }
        url.push_str(".json");
        url
    }

    fn request(&self, method: reqwest::Method, path: DocPath) -> reqwest::RequestBuilder {
        let request = self.http.request(method, self.url(path));
        match &self.auth {
            Some(auth) => request.query(&[("auth", auth)]),
            None => request,
        }
    }
}

impl MatchStore for HttpStore {
    fn get(&self, path: DocPath) -> BoxFuture<'_, Result<Option<Value>>> {
        async move {
            let value: Value = self
                .request(reqwest::Method::GET, path)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            tracing::trace!("GET {} -> {}", path, value);
            Ok(if value.is_null() { None } else { Some(value) })
        }
        .boxed()
    }

    fn put(&self, path: DocPath, value: Value) -> BoxFuture<'_, Result<()>> {
        async move {
            self.request(reqwest::Method::PUT, path)
                .json(&value)
                .send()
                .await?
                .error_for_status()?;
            Ok(())
        }
        .boxed()
    }

    fn patch(&self, path: DocPath, fields: Map<String, Value>) -> BoxFuture<'_, Result<()>> {
        async move {
            self.request(reqwest::Method::PATCH, path)
                .json(&fields)
                .send()
                .await?
                .error_for_status()?;
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_urls() {
        let room = RoomId::from_name("Koopa_12").unwrap();
        let store = HttpStore::new(
            "https://demo.firebaseio.com/",
            room,
            Duration::from_secs(3),
        )
        .unwrap();
        assert_eq!(
            store.url(DocPath::Room),
            "https://demo.firebaseio.com/battles/Koopa_12.json"
        );
        assert_eq!(
            store.url(DocPath::Player(Role::P2)),
            "https://demo.firebaseio.com/battles/Koopa_12/p2.json"
        );

        let store = store.with_root("arena");
        assert_eq!(
            store.url(DocPath::Player(Role::P1)),
            "https://demo.firebaseio.com/arena/Koopa_12/p1.json"
        );
    }

    #[test]
    fn test_auth_token_is_query_encoded() {
        let room = RoomId::from_name("Koopa_12").unwrap();
        let store = HttpStore::new("https://demo.firebaseio.com", room, Duration::from_secs(3))
            .unwrap()
            .with_auth(Some("a+b/c=d&e".to_string()));
        let request = store
            .request(reqwest::Method::PATCH, DocPath::Player(Role::P1))
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://demo.firebaseio.com/battles/Koopa_12/p1.json?auth=a%2Bb%2Fc%3Dd%26e"
        );
        assert_eq!(request.url().query_pairs().count(), 1);

        let store = store.with_auth(None);
        let request = store
            .request(reqwest::Method::GET, DocPath::Room)
            .build()
            .unwrap();
        assert_eq!(request.url().query(), None);
    }
}
