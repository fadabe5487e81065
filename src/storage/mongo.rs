//! MongoDB storage backend

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, ServerApi, ServerApiVersion};
use mongodb::{Client, Collection, Database};
use std::sync::Arc;

use crate::{Error, Result};

use super::{Connector, DocumentDatabase};

const APP_NAME: &str = "signup-gateway";

/// Connects with the Stable API v1 in strict mode.
pub struct MongoConnector {
    uri: String,
    database: String,
}

impl MongoConnector {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
        }
    }
}

#[async_trait]
impl Connector for MongoConnector {
    async fn connect(&self) -> Result<Arc<dyn DocumentDatabase>> {
        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| Error::unavailable(format!("invalid connection string: {}", e)))?;
        options.app_name = Some(APP_NAME.to_string());
        options.server_api = Some(
            ServerApi::builder()
                .version(ServerApiVersion::V1)
                .strict(true)
                .deprecation_errors(true)
                .build(),
        );

        let client = Client::with_options(options)
            .map_err(|e| Error::unavailable(format!("failed to build client: {}", e)))?;
        let database = client.database(&self.database);

        // The driver connects lazily; a ping forces server selection now.
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| Error::unavailable(format!("ping failed: {}", e)))?;

        Ok(Arc::new(MongoDatabase { database }))
    }

    /// Host list and database name, with any credentials stripped.
    ///
    /// Read straight from the connection string: `describe` is synchronous and
    /// runs before any connect attempt, while `ClientOptions::parse` is async
    /// and resolves `mongodb+srv://` seed lists over DNS.
    fn describe(&self) -> String {
        let hosts = self
            .uri
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.uri);
        let hosts = hosts.rsplit_once('@').map(|(_, h)| h).unwrap_or(hosts);
        let hosts = hosts.split(['/', '?']).next().unwrap_or_default();
        format!("mongodb://{}/{}", hosts, self.database)
    }
}

/// A selected MongoDB database.
pub struct MongoDatabase {
    database: Database,
}

impl MongoDatabase {
    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

#[async_trait]
impl DocumentDatabase for MongoDatabase {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson> {
        let result = self
            .collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| Error::write(e.to_string()))?;
        Ok(result.inserted_id)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        self.collection(collection)
            .find_one(filter)
            .await
            .map_err(|e| Error::storage(e.to_string()))
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        upsert: bool,
    ) -> Result<()> {
        self.collection(collection)
            .replace_one(filter, replacement)
            .upsert(upsert)
            .await
            .map_err(|e| Error::write(e.to_string()))?;
        Ok(())
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<()> {
        self.collection(collection)
            .delete_one(filter)
            .await
            .map_err(|e| Error::write(e.to_string()))?;
        Ok(())
    }
}
