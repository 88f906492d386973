use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use pingora::{
    apps::http_app::ServeHttp,
    protocols::http::ServerSession,
    services::listening::Service,
};
use pingora_core::listeners::tls::TlsSettings;
use pingora_error::{ErrorType::InternalError, OrErr, Result};

use crate::{
    auth::AuthorizationGate,
    backend::Backends,
    cache::Caches,
    config::{Config, Tls},
    core::{GatewayError, GatewayResult, RequestContext},
    handlers::{Reply, Routes},
    metrics,
    orchestration::RequestCoordinator,
    utils::{request, response::ResponseBuilder},
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// What the gateway needs from a downstream request, detached from the
/// session so dispatch can run without a socket.
pub struct GatewayRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: String,
}

/// The public HTTP surface: authorization, routing and error mapping in
/// front of the handlers.
pub struct GatewayHttpApp {
    gate: AuthorizationGate,
    routes: Routes,
    coordinator: Arc<RequestCoordinator>,
}

impl GatewayHttpApp {
    pub fn new(coordinator: Arc<RequestCoordinator>) -> Self {
        Self {
            gate: AuthorizationGate::new(coordinator.backends.auth.clone()),
            routes: Routes::new(),
            coordinator,
        }
    }

    /// Run one request to completion. Never fails: errors become
    /// `{"error": ...}` replies with the mapped status.
    pub async fn dispatch(&self, req: GatewayRequest) -> Reply {
        let ctx = RequestContext::new(None, Default::default());
        let mut route = "unmatched";

        let result = self.handle(&req, &ctx, &mut route).await;
        let mut reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                if e.status().is_server_error() {
                    log::error!("{} {} failed: {e}", req.method, req.path);
                } else {
                    log::debug!("{} {} rejected: {e}", req.method, req.path);
                }
                ResponseBuilder::error_json(e.status(), &e.public_message())
            }
        };

        if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
            reply.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        let status = reply.status().as_u16();
        let elapsed = ctx.elapsed_ms();
        log::info!(
            target: "access",
            request_id = ctx.request_id.as_str(),
            client_ip = req.client_ip.as_str(),
            method = req.method.as_str(),
            path = req.path.as_str(),
            status = status,
            elapsed_ms = elapsed as u64;
            "{} {} {status}",
            req.method,
            req.path
        );
        metrics::record_request(route, status, elapsed);
        reply
    }

    async fn handle(
        &self,
        req: &GatewayRequest,
        ctx: &RequestContext,
        route: &mut &'static str,
    ) -> GatewayResult<Reply> {
        let identity = self.gate.authorize(&req.path, &req.headers).await?;

        let Some(matched) = self.routes.at(&req.path) else {
            return Err(GatewayError::NotFound("not found".to_string()));
        };
        *route = matched.value.pattern;

        let Some(handler) = matched.value.handlers.get(&req.method) else {
            return Ok(ResponseBuilder::error_json(
                StatusCode::METHOD_NOT_ALLOWED,
                "method not allowed",
            ));
        };

        let request_ctx = RequestContext {
            request_id: ctx.request_id.clone(),
            request_start: ctx.request_start,
            identity,
            params: matched
                .params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        handler
            .handle(self.coordinator.clone(), request_ctx, req.body.clone())
            .await
    }
}

#[async_trait]
impl ServeHttp for GatewayHttpApp {
    async fn response(&self, http_session: &mut ServerSession) -> Reply {
        let body = match read_request_body(http_session).await {
            Ok(body) => body,
            Err(e) => {
                log::warn!("failed to read request body: {e}");
                return ResponseBuilder::error_json(
                    StatusCode::BAD_REQUEST,
                    "failed to read request body",
                );
            }
        };

        let peer = http_session
            .client_addr()
            .and_then(|addr| addr.as_inet())
            .map(|addr| addr.ip().to_string());
        let req_header = http_session.req_header();
        let req = GatewayRequest {
            method: req_header.method.clone(),
            path: req_header.uri.path().to_string(),
            headers: req_header.headers.clone(),
            client_ip: request::get_client_ip(&req_header.headers, peer),
            body,
        };

        self.dispatch(req).await
    }
}

async fn read_request_body(http_session: &mut ServerSession) -> Result<Bytes> {
    let mut body = BytesMut::new();
    while let Some(chunk) = http_session.read_request_body().await? {
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

/// Wire backends, caches and the coordinator from the configuration.
pub fn build_coordinator(config: &Config) -> Result<Arc<RequestCoordinator>> {
    let backends = Backends::from_config(&config.backends)
        .or_err(InternalError, "Failed to build backend clients")?;
    let (caches, stores) = Caches::from_config(&config.cache);
    Ok(Arc::new(RequestCoordinator::new(
        backends,
        caches,
        stores,
        Duration::from_secs(config.health.timeout),
    )))
}

/// Gateway service listening on every configured address.
pub fn build_gateway_service(config: &Config) -> Result<Service<GatewayHttpApp>> {
    let app = GatewayHttpApp::new(build_coordinator(config)?);
    let mut service = Service::new("Gateway HTTP".to_string(), app);

    for list_cfg in config.listeners.iter() {
        let address = list_cfg.address.to_string();
        match &list_cfg.tls {
            Some(Tls {
                cert_path,
                key_path,
            }) => {
                let mut settings = TlsSettings::intermediate(cert_path, key_path)?;
                if list_cfg.offer_h2 {
                    settings.enable_h2();
                }
                service.add_tls_with_settings(&address, None, settings);
            }
            None => service.add_tcp(&address),
        }
        log::info!("Listening on {address}");
    }

    Ok(service)
}
