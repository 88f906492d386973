//! Response building helpers shared by the handlers and the HTTP app.

use http::{header, Response, StatusCode};

/// Standard content types
pub mod content_type {
    pub const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";
    pub const APPLICATION_JSON: &str = "application/json";
}

pub struct ResponseBuilder;

impl ResponseBuilder {
    pub fn build(status: StatusCode, content_type: Option<&str>, body: Vec<u8>) -> Response<Vec<u8>> {
        let mut builder = Response::builder().status(status);
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        if !body.is_empty() {
            builder = builder.header(header::CONTENT_LENGTH, body.len());
        }

        builder.body(body).unwrap_or_else(|e| {
            log::error!("Failed to build response: {e}");
            Self::fallback()
        })
    }

    pub fn json(status: StatusCode, body: Vec<u8>) -> Response<Vec<u8>> {
        Self::build(status, Some(content_type::APPLICATION_JSON), body)
    }

    pub fn empty(status: StatusCode) -> Response<Vec<u8>> {
        Self::build(status, None, Vec::new())
    }

    /// `{"error": message}` with the given status.
    pub fn error_json(status: StatusCode, message: &str) -> Response<Vec<u8>> {
        match serde_json::to_vec(&serde_json::json!({ "error": message })) {
            Ok(body) => Self::json(status, body),
            Err(e) => {
                log::error!("Failed to serialize error response: {e}");
                Self::fallback()
            }
        }
    }

    fn fallback() -> Response<Vec<u8>> {
        let mut response = Response::new(b"Internal Server Error".to_vec());
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    }
}
