//! Cookie sessions persisted in the document store
//!
//! Records live in their own collection as `{ _id, session, expires }`, where
//! `session` is the JSON-encoded record. Nothing in the request path reads or
//! writes session data yet; the layer only issues a cookie once a handler
//! modifies its session.

use async_trait::async_trait;
use axum::Router;
use mongodb::bson::{self, doc};
use sha2::{Digest, Sha512};
use time::{Duration, OffsetDateTime};
use tower_sessions::cookie::Key;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, SessionStore};
use tower_sessions::{Expiry, SessionManagerLayer};

use crate::config::SessionSection;
use crate::storage::Storage;

/// Session settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub secret: String,
    pub collection: String,
    pub cookie_name: String,
    pub max_age: Duration,
    /// Only send the cookie over HTTPS.
    pub secure: bool,
}

impl SessionSettings {
    pub fn new(section: &SessionSection, secure: bool) -> Self {
        Self {
            secret: section.secret.clone(),
            collection: section.collection.clone(),
            cookie_name: section.cookie_name.clone(),
            max_age: Duration::seconds(section.max_age_secs as i64),
            secure,
        }
    }

    /// 64-byte signing key stretched from the configured secret.
    pub fn signing_key(&self) -> Key {
        let digest = Sha512::digest(self.secret.as_bytes());
        Key::from(digest.as_slice())
    }
}

/// Wrap `router` in a signed-cookie session manager backed by `storage`.
pub fn apply(router: Router, settings: &SessionSettings, storage: Storage) -> Router {
    let store = DocumentSessionStore::new(storage, settings.collection.clone());

    let layer = SessionManagerLayer::new(store)
        .with_name(settings.cookie_name.clone())
        .with_http_only(true)
        .with_secure(settings.secure)
        .with_expiry(Expiry::OnInactivity(settings.max_age))
        .with_signed(settings.signing_key());

    tracing::debug!(
        cookie = %settings.cookie_name,
        collection = %settings.collection,
        secure = settings.secure,
        "Session layer configured"
    );

    router.layer(layer)
}

/// [`SessionStore`] over a collection of the shared document store.
#[derive(Debug, Clone)]
pub struct DocumentSessionStore {
    storage: Storage,
    collection: String,
}

impl DocumentSessionStore {
    pub fn new(storage: Storage, collection: impl Into<String>) -> Self {
        Self {
            storage,
            collection: collection.into(),
        }
    }
}

fn backend(err: crate::Error) -> session_store::Error {
    session_store::Error::Backend(err.to_string())
}

fn to_bson_datetime(at: OffsetDateTime) -> bson::DateTime {
    bson::DateTime::from_millis((at.unix_timestamp_nanos() / 1_000_000) as i64)
}

#[async_trait]
impl SessionStore for DocumentSessionStore {
    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let session = serde_json::to_string(record)
            .map_err(|e| session_store::Error::Encode(e.to_string()))?;
        let id = record.id.to_string();
        let document = doc! {
            "_id": id.as_str(),
            "session": session,
            "expires": to_bson_datetime(record.expiry_date),
        };

        let database = self.storage.connect().await.map_err(backend)?;
        database
            .replace_one(&self.collection, doc! { "_id": id.as_str() }, document, true)
            .await
            .map_err(backend)
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let id = session_id.to_string();
        let database = self.storage.connect().await.map_err(backend)?;
        let Some(document) = database
            .find_one(&self.collection, doc! { "_id": id.as_str() })
            .await
            .map_err(backend)?
        else {
            return Ok(None);
        };

        let session = document
            .get_str("session")
            .map_err(|e| session_store::Error::Decode(e.to_string()))?;
        let record: Record = serde_json::from_str(session)
            .map_err(|e| session_store::Error::Decode(e.to_string()))?;

        if record.expiry_date <= OffsetDateTime::now_utc() {
            database
                .delete_one(&self.collection, doc! { "_id": id.as_str() })
                .await
                .map_err(backend)?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        let database = self.storage.connect().await.map_err(backend)?;
        database
            .delete_one(&self.collection, doc! { "_id": session_id.to_string() })
            .await
            .map_err(backend)
    }
}
