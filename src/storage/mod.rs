//! Document store abstraction layer
//!
//! Provides a unified interface for MongoDB and an in-process store, plus the
//! [`Storage`] handle that owns the one-time connection of a running process.

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::types::StorageState;
use crate::Result;

pub mod memory;
pub mod mongo;

/// Opens a connection to a document store and selects its database.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect, select the configured database and verify it answers.
    async fn connect(&self) -> Result<Arc<dyn DocumentDatabase>>;

    /// Short human-readable description used in logs.
    fn describe(&self) -> String;
}

/// A connected database handle.
#[async_trait]
pub trait DocumentDatabase: Send + Sync {
    /// Insert a document, returning the id the store assigned to it.
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson>;

    /// Fetch the first document matching every key/value of `filter`.
    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>>;

    /// Replace the first document matching `filter`, inserting when `upsert` is set.
    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        upsert: bool,
    ) -> Result<()>;

    /// Delete the first document matching `filter`.
    async fn delete_one(&self, collection: &str, filter: Document) -> Result<()>;
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Mongo { uri: String, database: String },
    Memory,
}

/// Create a connector from config
pub fn create_connector(config: StorageConfig) -> Box<dyn Connector> {
    match config {
        StorageConfig::Mongo { uri, database } => Box::new(mongo::MongoConnector::new(uri, database)),
        StorageConfig::Memory => Box::new(memory::MemoryConnector::new()),
    }
}

/// Process-wide handle to the document store.
///
/// Moves from not-ready to ready at most once. Concurrent callers of
/// [`Storage::connect`] share a single connection attempt; a failed attempt
/// leaves the handle not-ready so the next caller tries again.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

struct StorageInner {
    connector: Box<dyn Connector>,
    database: OnceCell<Arc<dyn DocumentDatabase>>,
}

impl Storage {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            inner: Arc::new(StorageInner {
                connector,
                database: OnceCell::new(),
            }),
        }
    }

    pub fn from_config(config: StorageConfig) -> Self {
        Self::new(create_connector(config))
    }

    /// Connect if needed and return the database handle.
    pub async fn connect(&self) -> Result<Arc<dyn DocumentDatabase>> {
        let database = self
            .inner
            .database
            .get_or_try_init(|| async {
                let target = self.inner.connector.describe();
                tracing::info!(%target, "Connecting to document store");
                let database = self.inner.connector.connect().await?;
                tracing::info!(%target, "Document store initialised");
                Ok::<_, crate::Error>(database)
            })
            .await?;
        Ok(database.clone())
    }

    /// Like [`Storage::connect`] but reports failure as `false` after logging it.
    pub async fn ensure_ready(&self) -> bool {
        if self.is_ready() {
            return true;
        }
        match self.connect().await {
            Ok(_) => true,
            Err(err) => {
                tracing::error!(error = %err, "Failed to initialise document store");
                false
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.database.initialized()
    }

    /// Ready database handle, if any. Never touches the network.
    pub fn database(&self) -> Option<Arc<dyn DocumentDatabase>> {
        self.inner.database.get().cloned()
    }

    pub fn state(&self) -> StorageState {
        if self.is_ready() {
            StorageState::Ready
        } else {
            StorageState::NotReady
        }
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("target", &self.inner.connector.describe())
            .field("state", &self.state())
            .finish()
    }
}
