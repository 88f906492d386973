//! Endpoint handlers and the route table.
//!
//! A handler is an async fn over the shared coordinator, the request
//! context (identity and path parameters) and the raw body. Paths follow
//! the public API: everything lives under `/api/v1/` with a trailing slash.

use std::{collections::HashMap, future::Future, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Response, StatusCode};
use matchit::{Match, Router};
use serde::{de::DeserializeOwned, Serialize};
use validator::Validate;

use crate::{
    core::{ErrorContext, GatewayError, GatewayResult, RequestContext},
    model::validation_message,
    orchestration::RequestCoordinator,
    utils::response::ResponseBuilder,
};

pub mod auth;
pub mod blog;
pub mod health;
pub mod notifications;
pub mod offers;
pub mod orders;
pub mod profile;
pub mod reviews;
pub mod security;

pub type Reply = Response<Vec<u8>>;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(
        &self,
        coordinator: Arc<RequestCoordinator>,
        ctx: RequestContext,
        body: Bytes,
    ) -> GatewayResult<Reply>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Arc<RequestCoordinator>, RequestContext, Bytes) -> Fut + Send + Sync,
    Fut: Future<Output = GatewayResult<Reply>> + Send + 'static,
{
    async fn handle(
        &self,
        coordinator: Arc<RequestCoordinator>,
        ctx: RequestContext,
        body: Bytes,
    ) -> GatewayResult<Reply> {
        (self.0)(coordinator, ctx, body).await
    }
}

/// Handlers registered under one path pattern.
pub struct Endpoint {
    pub pattern: &'static str,
    pub handlers: HashMap<Method, Box<dyn Handler>>,
}

pub struct Routes {
    router: Router<Endpoint>,
}

impl Default for Routes {
    fn default() -> Self {
        Self::new()
    }
}

impl Routes {
    /// Every endpoint the gateway serves.
    pub fn new() -> Self {
        let mut routes = Self {
            router: Router::new(),
        };
        health::register(&mut routes);
        auth::register(&mut routes);
        profile::register(&mut routes);
        security::register(&mut routes);
        offers::register(&mut routes);
        orders::register(&mut routes);
        reviews::register(&mut routes);
        blog::register(&mut routes);
        notifications::register(&mut routes);
        routes
    }

    pub fn route<F, Fut>(&mut self, pattern: &'static str, method: Method, handler: F) -> &mut Self
    where
        F: Fn(Arc<RequestCoordinator>, RequestContext, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = GatewayResult<Reply>> + Send + 'static,
    {
        let handler: Box<dyn Handler> = Box::new(FnHandler(handler));
        if let Ok(endpoint) = self.router.at_mut(pattern) {
            if endpoint.value.pattern == pattern {
                endpoint.value.handlers.insert(method, handler);
                return self;
            }
        }

        let endpoint = Endpoint {
            pattern,
            handlers: HashMap::from([(method, handler)]),
        };
        if let Err(e) = self.router.insert(pattern, endpoint) {
            log::error!("failed to register route {pattern}: {e}");
        }
        self
    }

    pub fn at<'p>(&self, path: &'p str) -> Option<Match<'_, 'p, &Endpoint>> {
        self.router.at(path).ok()
    }
}

/// Decode a JSON body.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> GatewayResult<T> {
    serde_json::from_slice(body).map_err(GatewayError::from)
}

/// Decode a JSON body and run its validation rules.
pub fn parse_valid<T: DeserializeOwned + Validate>(body: &[u8]) -> GatewayResult<T> {
    let value: T = parse_body(body)?;
    value
        .validate()
        .map_err(|e| GatewayError::Validation(validation_message(&e)))?;
    Ok(value)
}

/// Optional JSON body; an empty one decodes as `T::default()`.
pub fn parse_optional<T: DeserializeOwned + Default>(body: &[u8]) -> GatewayResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_body(body)
}

pub fn json<T: Serialize>(status: StatusCode, value: &T) -> GatewayResult<Reply> {
    let body = serde_json::to_vec(value).with_context("failed to encode reply")?;
    Ok(ResponseBuilder::json(status, body))
}

pub fn empty(status: StatusCode) -> GatewayResult<Reply> {
    Ok(ResponseBuilder::empty(status))
}

/// `{"message": ...}` reply.
pub fn message(status: StatusCode, message: &str) -> GatewayResult<Reply> {
    json(status, &serde_json::json!({ "message": message }))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::model::SignUpRequest;

    #[test]
    fn test_route_table() {
        let routes = Routes::new();

        let matched = routes.at("/api/v1/orders/get-order-details/42/").unwrap();
        assert_eq!(matched.value.pattern, "/api/v1/orders/get-order-details/{order_id}/");
        assert_eq!(matched.params.get("order_id"), Some("42"));
        assert!(matched.value.handlers.contains_key(&Method::GET));
        assert!(!matched.value.handlers.contains_key(&Method::POST));

        assert!(routes.at("/api/v1/profile/get-public-profile/").is_some());
        assert!(routes.at("/api/v1/profile/get-public-profile/7/").is_some());
        assert!(routes.at("/api/v1/unknown/").is_none());
    }

    #[test]
    fn test_parse_body_errors_are_validation() {
        #[derive(Debug, Deserialize)]
        struct Body {
            #[allow(dead_code)]
            id: u64,
        }

        let err = parse_body::<Body>(b"{\"id\": \"x\"}").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_parse_valid_runs_rules() {
        let err = parse_valid::<SignUpRequest>(br#"{"email": "nope", "password": "secret123"}"#)
            .unwrap_err();
        assert_eq!(err.public_message(), "invalid email address");
    }

    #[test]
    fn test_parse_optional_empty_body() {
        let value: serde_json::Value = parse_optional(b"").unwrap();
        assert!(value.is_null());
    }
}
