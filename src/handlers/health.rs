use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};

use super::{Reply, Routes};
use crate::{
    core::{GatewayError, GatewayResult, RequestContext},
    metrics,
    orchestration::RequestCoordinator,
    utils::response::{content_type, ResponseBuilder},
};

pub fn register(routes: &mut Routes) {
    routes
        .route("/health/", Method::GET, health)
        .route("/metrics/", Method::GET, prometheus);
}

/// 200 when every backend and cache store answers, 503 naming the first
/// one that did not.
async fn health(
    c: Arc<RequestCoordinator>,
    _ctx: RequestContext,
    _body: Bytes,
) -> GatewayResult<Reply> {
    match c.check_health().await {
        Ok(()) => super::message(StatusCode::OK, "ok"),
        Err(GatewayError::Aggregate { service, source }) => {
            log::warn!("health check failed for {service}: {source}");
            Ok(ResponseBuilder::error_json(
                StatusCode::SERVICE_UNAVAILABLE,
                &format!("{service} service unhealthy"),
            ))
        }
        Err(e) => Err(e),
    }
}

async fn prometheus(
    _c: Arc<RequestCoordinator>,
    _ctx: RequestContext,
    _body: Bytes,
) -> GatewayResult<Reply> {
    Ok(ResponseBuilder::build(
        StatusCode::OK,
        Some(content_type::PROMETHEUS_TEXT),
        metrics::gather(),
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{backend::ErrorKind, testing::Harness};

    fn ctx() -> RequestContext {
        RequestContext::new(None, BTreeMap::new())
    }

    #[tokio::test]
    async fn test_health_ok() {
        let h = Harness::new();
        let reply = health(h.coordinator.clone(), ctx(), Bytes::new())
            .await
            .unwrap();
        assert_eq!(reply.status(), StatusCode::OK);
        assert_eq!(h.notifications.calls("HealthCheck"), 1);
    }

    #[tokio::test]
    async fn test_health_unhealthy_backend() {
        let h = Harness::new();
        h.orders
            .fail("HealthCheck", ErrorKind::Internal, "connection refused");
        let reply = health(h.coordinator.clone(), ctx(), Bytes::new())
            .await
            .unwrap();
        assert_eq!(reply.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(reply.body(), br#"{"error":"orders service unhealthy"}"#);
    }
}
