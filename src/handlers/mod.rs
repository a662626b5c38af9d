// handlers/mod.rs - HTTP handlers, one module per resource
//
// Every handler returns `ApiResult<T>`; failures go through `ApiError` so
// clients always see the same envelope.

pub mod categories;
pub mod health;
pub mod orders;
pub mod products;
pub mod users;

use axum::http::{header, HeaderMap};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;

/// Body of responses that only confirm an action
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Path ids are parsed by hand so a malformed id gets the error envelope
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request(format!("Invalid id '{}'", raw)))
}

/// Host the client used to reach us, for building absolute upload URLs
pub fn request_host(headers: &HeaderMap, fallback: &str) -> String {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn malformed_ids_are_bad_requests() {
        assert!(parse_id(&Uuid::nil().to_string()).is_ok());
        let err = parse_id("6114196235f8692078ed8629").unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn host_header_wins_over_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_host(&headers, "localhost:3000"), "localhost:3000");
        headers.insert(header::HOST, HeaderValue::from_static("shop.example.com"));
        assert_eq!(request_host(&headers, "localhost:3000"), "shop.example.com");
    }
}
