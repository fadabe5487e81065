//! Core types for signup-gateway

use chrono::{DateTime, Utc};
use mongodb::bson::{self, Bson, Document};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::validation;
use crate::Result;

/// Field names the system writes on every stored submission.
pub const SUBMITTED_AT: &str = "submittedAt";
pub const IP_ADDRESS: &str = "ipAddress";
pub const USER_AGENT: &str = "userAgent";

/// Store-assigned identifier key.
pub const ID_FIELD: &str = "_id";

/// Caller keys that are never copied into the stored record.
const RESERVED_FIELDS: [&str; 4] = [ID_FIELD, SUBMITTED_AT, IP_ADDRESS, USER_AGENT];

/// A validated signup form as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedForm {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Any other caller fields, minus the reserved ones.
    pub extra: Map<String, Value>,
}

impl SubmittedForm {
    /// Validate a raw payload and split it into known and extra fields.
    pub fn from_payload(mut payload: Map<String, Value>) -> Result<Self> {
        validation::validate(&payload)?;

        let mut take = |name: &str| match payload.remove(name) {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        let username = take("username");
        let email = take("email");
        let password = take("password");

        for reserved in RESERVED_FIELDS {
            if payload.remove(reserved).is_some() {
                tracing::debug!(field = reserved, "Dropping caller-supplied reserved field");
            }
        }

        Ok(Self {
            username,
            email,
            password,
            extra: payload,
        })
    }
}

/// Transport-level facts about the request that carried a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// The document written to the `signup` collection.
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub form: SubmittedForm,
    pub submitted_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl SubmissionRecord {
    pub fn new(form: SubmittedForm, meta: RequestMeta, submitted_at: DateTime<Utc>) -> Self {
        Self {
            form,
            submitted_at,
            ip_address: meta.ip_address,
            user_agent: meta.user_agent,
        }
    }

    /// Render as a BSON document: caller fields first, system fields last.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("username", self.form.username.as_str());
        doc.insert("email", self.form.email.as_str());
        doc.insert("password", self.form.password.as_str());

        for (key, value) in &self.form.extra {
            doc.insert(key.as_str(), json_to_bson(value));
        }

        doc.insert(
            SUBMITTED_AT,
            bson::DateTime::from_millis(self.submitted_at.timestamp_millis()),
        );
        doc.insert(IP_ADDRESS, optional_string(&self.ip_address));
        doc.insert(USER_AGENT, optional_string(&self.user_agent));
        doc
    }
}

/// Convert a caller-supplied JSON value into BSON.
///
/// Integers that fit take `Int64`; anything wider (unsigned values past
/// `i64::MAX`) and all fractional numbers become `Double`.
pub fn json_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Bson::Int64(i),
            None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_bson(v)))
                .collect(),
        ),
    }
}

fn optional_string(value: &Option<String>) -> Bson {
    value
        .as_ref()
        .map(|s| Bson::String(s.clone()))
        .unwrap_or(Bson::Null)
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Created {
    pub id: String,
}

/// Render a store id as the string handed back to callers.
pub fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Connection lifecycle of the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageState {
    NotReady,
    Ready,
}

impl StorageState {
    pub fn label(self) -> &'static str {
        match self {
            StorageState::NotReady => "Not initialized",
            StorageState::Ready => "Initialized",
        }
    }
}
