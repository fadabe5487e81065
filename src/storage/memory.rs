//! In-process document store
//!
//! Mirrors the subset of MongoDB behaviour the service relies on: documents
//! without an `_id` get a fresh ObjectId, and filters match on exact
//! top-level equality.

use async_trait::async_trait;
use dashmap::DashMap;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::types::ID_FIELD;
use crate::{Error, Result};

use super::{Connector, DocumentDatabase};

/// Connector that always hands out the same in-memory database.
#[derive(Clone)]
pub struct MemoryConnector {
    database: Arc<MemoryDatabase>,
    available: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self {
            database: Arc::new(MemoryDatabase::default()),
            available: Arc::new(AtomicBool::new(true)),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make subsequent connection attempts succeed or fail.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Shared database, for inspecting what was written.
    pub fn database(&self) -> Arc<MemoryDatabase> {
        self.database.clone()
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn DocumentDatabase>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::unavailable("in-memory store refused the connection"));
        }
        Ok(self.database.clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Collections of documents kept in insertion order.
#[derive(Default)]
pub struct MemoryDatabase {
    collections: DashMap<String, Vec<Document>>,
    read_only: AtomicBool,
}

impl MemoryDatabase {
    /// Reject every write with an error, as a failing server would.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Snapshot of one collection.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(Error::write("in-memory store is read-only"));
        }
        Ok(())
    }
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, expected)| document.get(key) == Some(expected))
}

#[async_trait]
impl DocumentDatabase for MemoryDatabase {
    async fn insert_one(&self, collection: &str, mut document: Document) -> Result<Bson> {
        self.check_writable()?;

        let id = match document.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert(ID_FIELD, id.clone());
                id
            }
        };

        let mut docs = self.collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| d.get(ID_FIELD) == Some(&id)) {
            return Err(Error::write(format!("duplicate key {}", id)));
        }
        docs.push(document);
        Ok(id)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches(d, &filter)).cloned()))
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        mut replacement: Document,
        upsert: bool,
    ) -> Result<()> {
        self.check_writable()?;

        let mut docs = self.collections.entry(collection.to_string()).or_default();
        if let Some(existing) = docs.iter_mut().find(|d| matches(d, &filter)) {
            if let Some(id) = existing.get(ID_FIELD).cloned() {
                replacement.insert(ID_FIELD, id);
            }
            *existing = replacement;
            return Ok(());
        }

        if upsert {
            if !replacement.contains_key(ID_FIELD) {
                let id = filter
                    .get(ID_FIELD)
                    .cloned()
                    .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));
                replacement.insert(ID_FIELD, id);
            }
            docs.push(replacement);
        }
        Ok(())
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<()> {
        self.check_writable()?;

        if let Some(mut docs) = self.collections.get_mut(collection) {
            if let Some(pos) = docs.iter().position(|d| matches(d, &filter)) {
                docs.remove(pos);
            }
        }
        Ok(())
    }
}
