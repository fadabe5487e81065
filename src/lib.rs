//! signup-gateway - a small HTTP backend for signup forms
//!
//! - `POST /submit-form` validates a JSON form and stores it in MongoDB
//! - `GET /health` reports whether the document store is initialised
//! - Cookie sessions persisted in the same database

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod submission;
pub mod types;
pub mod validation;

pub use error::{Error, Result};
