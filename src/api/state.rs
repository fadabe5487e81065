//! API server state

use crate::storage::Storage;
use crate::submission::SubmissionService;

/// API server state
#[derive(Debug, Clone)]
pub struct AppState {
    /// Submission use-case
    pub submissions: SubmissionService,

    /// Shared document store handle, read by the health check
    pub storage: Storage,

    /// Largest accepted request body, in bytes
    pub body_limit: usize,

    /// Trust `X-Forwarded-For` for the client address
    pub trust_proxy: bool,
}

impl AppState {
    /// State with the default body limit and no proxy trust.
    pub fn new(storage: Storage) -> Self {
        Self {
            submissions: SubmissionService::new(storage.clone()),
            storage,
            body_limit: crate::config::ServerConfig::default().body_limit,
            trust_proxy: false,
        }
    }

    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    pub fn with_trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }
}
