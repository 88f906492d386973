//! Unified error handling for the gateway
//!
//! Every failure a request can hit is folded into [`GatewayError`], which
//! knows the HTTP status it maps to. Handlers return [`GatewayResult`] and
//! the HTTP app turns the error into a `{"error": ...}` reply.

use std::fmt;

use http::StatusCode;

use crate::backend::{BackendError, ErrorKind};

#[derive(Debug)]
pub enum GatewayError {
    /// Configuration-related errors
    Configuration(String),

    /// Malformed body, unparsable path parameter, broken invariant
    Validation(String),

    /// Missing or rejected credential
    Unauthenticated(String),

    /// Role or ownership mismatch
    Forbidden(String),

    /// Entity missing, detected locally
    NotFound(String),

    /// Error returned by a backend service
    Backend(BackendError),

    /// One sub-request of a fan-out failed
    Aggregate {
        service: &'static str,
        source: Box<GatewayError>,
    },

    /// Cache store unreachable or returned garbage
    Cache(String),

    /// Internal system errors
    Internal(String),
}

impl GatewayError {
    /// HTTP status the error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Backend(err) => match err.kind {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::AlreadyExists | ErrorKind::InvalidState => StatusCode::BAD_REQUEST,
                ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::Aggregate { source, .. } => source.status(),
            GatewayError::Configuration(_) | GatewayError::Cache(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message exposed to the caller. Backend messages are passed through.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::Validation(msg)
            | GatewayError::Unauthenticated(msg)
            | GatewayError::Forbidden(msg)
            | GatewayError::NotFound(msg)
            | GatewayError::Cache(msg)
            | GatewayError::Internal(msg)
            | GatewayError::Configuration(msg) => msg.clone(),
            GatewayError::Backend(err) => err.message.clone(),
            GatewayError::Aggregate { service, source } => {
                format!("failed to {service}: {}", source.public_message())
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == StatusCode::NOT_FOUND
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            GatewayError::Validation(msg) => write!(f, "Validation error: {msg}"),
            GatewayError::Unauthenticated(msg) => write!(f, "Unauthenticated: {msg}"),
            GatewayError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            GatewayError::NotFound(msg) => write!(f, "Resource not found: {msg}"),
            GatewayError::Backend(err) => write!(f, "Backend error: {err}"),
            GatewayError::Aggregate { service, source } => {
                write!(f, "Fan-out to {service} failed: {source}")
            }
            GatewayError::Cache(msg) => write!(f, "Cache error: {msg}"),
            GatewayError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Backend(err) => Some(err),
            GatewayError::Aggregate { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<BackendError> for GatewayError {
    fn from(err: BackendError) -> Self {
        GatewayError::Backend(err)
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Validation(err.to_string())
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> GatewayResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> GatewayResult<T> {
        self.map_err(|e| GatewayError::Internal(format!("{context}: {e}")))
    }
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::GatewayError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::GatewayError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::core::GatewayError::Internal($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::GatewayError::Internal(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Forbidden("no".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::Backend(BackendError::new(ErrorKind::NotFound, "order not found"))
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::Backend(BackendError::new(ErrorKind::AlreadyExists, "dup")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Cache("down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_aggregate_message_and_status() {
        let err = GatewayError::Aggregate {
            service: "orders",
            source: Box::new(GatewayError::Backend(BackendError::new(
                ErrorKind::Internal,
                "boom",
            ))),
        };
        assert_eq!(err.public_message(), "failed to orders: boom");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_with_context() {
        let res: Result<(), &str> = Err("broken pipe");
        let err = res.with_context("writing cache").unwrap_err();
        assert_eq!(err.public_message(), "writing cache: broken pipe");
    }

    #[test]
    fn test_macros() {
        let err = internal_error!("code {} failed", 7);
        assert!(matches!(err, GatewayError::Internal(ref m) if m == "code 7 failed"));
        let err = config_error!("missing listener");
        assert!(matches!(err, GatewayError::Configuration(_)));
    }
}
