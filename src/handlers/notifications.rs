use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};

use super::{Reply, Routes};
use crate::{
    core::{GatewayError, GatewayResult, RequestContext},
    orchestration::RequestCoordinator,
};

pub fn register(routes: &mut Routes) {
    routes
        .route(
            "/api/v1/notifications/get-notifications-list/{skip}/",
            Method::GET,
            list,
        )
        .route(
            "/api/v1/notifications/delete-notification/{notification_id}/",
            Method::DELETE,
            delete,
        )
        .route(
            "/api/v1/notifications/clear-notifications/",
            Method::DELETE,
            clear,
        );
}

async fn list(c: Arc<RequestCoordinator>, ctx: RequestContext, _body: Bytes) -> GatewayResult<Reply> {
    let skip: u64 = ctx.param("skip")?;
    let customer_id = ctx.identity()?.customer_id;
    let notifications = c.backends.notifications.clone();
    let fetch = move || async move {
        notifications
            .get_notifications(customer_id, skip)
            .await
            .map_err(GatewayError::from)
    };

    let list = if skip == 0 {
        c.read_through(&c.caches.notifications, customer_id, fetch)
            .await?
    } else {
        fetch().await?
    };
    super::json(StatusCode::OK, &list)
}

async fn delete(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    _body: Bytes,
) -> GatewayResult<Reply> {
    let notification_id: u64 = ctx.param("notification_id")?;
    let customer_id = ctx.identity()?.customer_id;

    c.caches.notifications.delete(customer_id).await?;
    c.backends
        .notifications
        .delete_notification(notification_id, customer_id)
        .await?;
    super::empty(StatusCode::NO_CONTENT)
}

async fn clear(c: Arc<RequestCoordinator>, ctx: RequestContext, _body: Bytes) -> GatewayResult<Reply> {
    let customer_id = ctx.identity()?.customer_id;

    c.caches.notifications.delete(customer_id).await?;
    c.backends
        .notifications
        .clear_notifications(customer_id)
        .await?;
    super::empty(StatusCode::NO_CONTENT)
}
