//! Backend service access.
//!
//! Every backend (auth, profile, orders, offers, reviews, blog,
//! notifications) is reached through an [`RpcChannel`]: a method name plus a
//! JSON request in, a JSON reply or a structured [`BackendError`] out. The
//! typed clients in [`clients`] wrap a channel and fix the request and reply
//! shapes of each method.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use futures::{future::BoxFuture, FutureExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{config, config_error, core::GatewayResult, metrics};

mod clients;
pub mod rpc;

pub use clients::{
    AuthClient, BlogClient, NotificationsClient, OffersClient, OrdersClient, ProfileClient,
    ReviewsClient,
};

/// Error classes a backend reports across the RPC boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidState,
    Unauthenticated,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendError {
    pub kind: ErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for BackendError {}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Transport to one backend service.
#[async_trait]
pub trait RpcChannel: Send + Sync {
    async fn call(&self, method: &str, request: Value) -> BackendResult<Value>;
}

/// Encode `request`, call `method` and decode the reply.
pub(crate) async fn invoke<Req, Resp>(
    channel: &dyn RpcChannel,
    service: &'static str,
    method: &str,
    request: &Req,
) -> BackendResult<Resp>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let reply = call_recorded(channel, service, method, request).await?;
    serde_json::from_value(reply).map_err(|e| {
        BackendError::internal(format!("{service}.{method} returned an invalid reply: {e}"))
    })
}

/// Like [`invoke`] for methods whose reply carries nothing the gateway uses.
pub(crate) async fn invoke_unit<Req>(
    channel: &dyn RpcChannel,
    service: &'static str,
    method: &str,
    request: &Req,
) -> BackendResult<()>
where
    Req: Serialize + ?Sized,
{
    call_recorded(channel, service, method, request)
        .await
        .map(|_| ())
}

async fn call_recorded<Req>(
    channel: &dyn RpcChannel,
    service: &'static str,
    method: &str,
    request: &Req,
) -> BackendResult<Value>
where
    Req: Serialize + ?Sized,
{
    let request = serde_json::to_value(request).map_err(|e| {
        BackendError::internal(format!("failed to encode {service}.{method} request: {e}"))
    })?;

    log::debug!("calling {service}.{method}");
    let result = channel.call(method, request).await;
    metrics::record_backend_call(service, method, result.as_ref().err().map(|e| e.kind));
    result
}

/// One typed client per backend service.
#[derive(Clone)]
pub struct Backends {
    pub auth: AuthClient,
    pub profile: ProfileClient,
    pub orders: OrdersClient,
    pub offers: OffersClient,
    pub reviews: ReviewsClient,
    pub blog: BlogClient,
    pub notifications: NotificationsClient,
}

impl Backends {
    pub fn from_config(cfg: &config::Backends) -> GatewayResult<Self> {
        let channel = |service: &'static str, backend: &config::Backend| {
            rpc::HttpRpcChannel::new(service, backend, &cfg.retry)
                .map(|ch| Arc::new(ch) as Arc<dyn RpcChannel>)
                .map_err(|e| config_error!("backend {}: {}", service, e))
        };

        Ok(Self {
            auth: AuthClient::new(channel(AuthClient::SERVICE, &cfg.auth)?),
            profile: ProfileClient::new(channel(ProfileClient::SERVICE, &cfg.profile)?),
            orders: OrdersClient::new(channel(OrdersClient::SERVICE, &cfg.orders)?),
            offers: OffersClient::new(channel(OffersClient::SERVICE, &cfg.offers)?),
            reviews: ReviewsClient::new(channel(ReviewsClient::SERVICE, &cfg.reviews)?),
            blog: BlogClient::new(channel(BlogClient::SERVICE, &cfg.blog)?),
            notifications: NotificationsClient::new(channel(
                NotificationsClient::SERVICE,
                &cfg.notifications,
            )?),
        })
    }

    /// A health probe per service, labelled with the service name.
    pub fn health_probes(&self) -> Vec<(&'static str, BoxFuture<'static, BackendResult<()>>)> {
        let auth = self.auth.clone();
        let profile = self.profile.clone();
        let orders = self.orders.clone();
        let offers = self.offers.clone();
        let reviews = self.reviews.clone();
        let blog = self.blog.clone();
        let notifications = self.notifications.clone();

        vec![
            (AuthClient::SERVICE, async move { auth.health_check().await }.boxed()),
            (ProfileClient::SERVICE, async move { profile.health_check().await }.boxed()),
            (OrdersClient::SERVICE, async move { orders.health_check().await }.boxed()),
            (OffersClient::SERVICE, async move { offers.health_check().await }.boxed()),
            (ReviewsClient::SERVICE, async move { reviews.health_check().await }.boxed()),
            (BlogClient::SERVICE, async move { blog.health_check().await }.boxed()),
            (
                NotificationsClient::SERVICE,
                async move { notifications.health_check().await }.boxed(),
            ),
        ]
    }
}
