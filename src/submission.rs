//! Signup form submission use-case

use chrono::Utc;
use serde_json::{Map, Value};

use crate::storage::Storage;
use crate::types::{id_to_string, Created, RequestMeta, SubmissionRecord, SubmittedForm};
use crate::{Error, Result};

/// Collection submissions are written to.
pub const SIGNUP_COLLECTION: &str = "signup";

/// Validates submissions and writes each accepted one exactly once.
#[derive(Debug, Clone)]
pub struct SubmissionService {
    storage: Storage,
    collection: String,
}

impl SubmissionService {
    pub fn new(storage: Storage) -> Self {
        Self::with_collection(storage, SIGNUP_COLLECTION)
    }

    pub fn with_collection(storage: Storage, collection: impl Into<String>) -> Self {
        Self {
            storage,
            collection: collection.into(),
        }
    }

    /// Check order: storage reachable, required fields present, email format.
    pub async fn submit(&self, payload: Map<String, Value>, meta: RequestMeta) -> Result<Created> {
        if !self.storage.ensure_ready().await {
            return Err(Error::unavailable("document store is not initialised"));
        }
        let database = self
            .storage
            .database()
            .ok_or_else(|| Error::internal("document store ready without a handle"))?;

        let username = payload
            .get("username")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        tracing::info!(
            username = %username,
            fields = payload.len(),
            ip = meta.ip_address.as_deref().unwrap_or("-"),
            "Received form submission"
        );

        let form = SubmittedForm::from_payload(payload)?;
        let record = SubmissionRecord::new(form, meta, Utc::now());
        let document = record.to_document();

        let inserted = database.insert_one(&self.collection, document).await?;
        let id = id_to_string(&inserted);
        tracing::info!(%id, collection = %self.collection, "Form submitted");

        Ok(Created { id })
    }
}
