//! API handlers

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::net::SocketAddr;

use crate::api::AppState;
use crate::types::RequestMeta;
use crate::Error;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Health check. Reads the storage state only; never touches the network.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        mongo: state.storage.state().label(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub mongo: &'static str,
}

/// Accept a signup form
pub async fn submit_form(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let body = body.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Rejected form body");
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        ApiError::new(status, rejection.body_text())
    })?;

    let payload = parse_form_body(&headers, &body).map_err(|err| {
        tracing::warn!(error = %err, "Rejected malformed JSON body");
        ApiError::new(StatusCode::BAD_REQUEST, "Malformed JSON body")
    })?;

    let meta = request_meta(&headers, connect_info, state.trust_proxy);

    let created = state
        .submissions
        .submit(payload, meta)
        .await
        .map_err(|err| {
            if err.is_client_error() {
                tracing::info!(error = %err, "Form submission rejected");
            } else {
                tracing::error!(error = %err, "Error submitting form");
            }
            ApiError::from(err)
        })?;

    Ok(Json(SubmitResponse {
        success: true,
        id: created.id,
        message: "Form submitted successfully",
    }))
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub id: String,
    pub message: &'static str,
}

/// Decode a form body the way a JSON body parser feeding a field lookup would:
/// a non-JSON content type, an empty body or a non-object document all yield
/// an empty form, leaving the required-field check to reject it.
fn parse_form_body(headers: &HeaderMap, body: &[u8]) -> serde_json::Result<Map<String, Value>> {
    if !is_json_content_type(headers) || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(body)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

fn request_meta(
    headers: &HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    trust_proxy: bool,
) -> RequestMeta {
    let forwarded = if trust_proxy {
        headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    } else {
        None
    };

    let ip_address =
        forwarded.or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()));

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    RequestMeta {
        ip_address,
        user_agent,
    }
}

/// Failure envelope: `{ "success": false, "error": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::new(err.status(), err.public_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.message,
        }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_meta_prefers_forwarded_only_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static("198.51.100.7, 10.0.0.1"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        let peer = Some(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 4242))));

        let meta = request_meta(&headers, peer, true);
        assert_eq!(meta.ip_address.as_deref(), Some("198.51.100.7"));
        assert_eq!(meta.user_agent.as_deref(), Some("Mozilla/5.0"));

        let meta = request_meta(&headers, peer, false);
        assert_eq!(meta.ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_form_body_non_objects_become_empty_forms() {
        let mut json = HeaderMap::new();
        json.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );

        for body in ["[1, 2, 3]", "\"x\"", "null", "42", "", "  "] {
            let form = parse_form_body(&json, body.as_bytes()).unwrap();
            assert!(form.is_empty(), "{body:?} should decode to an empty form");
        }

        let form = parse_form_body(&json, br#"{"username":"alice"}"#).unwrap();
        assert_eq!(form["username"], Value::from("alice"));

        assert!(parse_form_body(&json, b"{ not json").is_err());
    }

    #[test]
    fn test_form_body_ignored_without_json_content_type() {
        let form = parse_form_body(&HeaderMap::new(), br#"{"username":"alice"}"#).unwrap();
        assert!(form.is_empty());

        let mut text = HeaderMap::new();
        text.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(parse_form_body(&text, b"{ not json").unwrap().is_empty());

        let mut vendor = HeaderMap::new();
        vendor.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/vnd.api+json"),
        );
        assert!(is_json_content_type(&vendor));
    }

    #[test]
    fn test_request_meta_without_transport_info() {
        let meta = request_meta(&HeaderMap::new(), None, true);
        assert_eq!(meta, RequestMeta::default());
    }
}
