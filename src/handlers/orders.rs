use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};

use super::{Reply, Routes};
use crate::{
    core::{GatewayError, GatewayResult, RequestContext},
    model::{ComplianceRequest, Order, OrderBasics, OrdersFilter},
    orchestration::{FanOut, RequestCoordinator},
};

pub fn register(routes: &mut Routes) {
    routes
        .route("/api/v1/orders/create/", Method::POST, create)
        .route("/api/v1/orders/update/", Method::PUT, update)
        .route(
            "/api/v1/orders/get-orders-list-by-filter/",
            Method::POST,
            list_by_filter,
        )
        .route(
            "/api/v1/orders/get-order-details/{order_id}/",
            Method::GET,
            details,
        )
        .route("/api/v1/orders/delete/{order_id}/", Method::DELETE, delete)
        .route(
            "/api/v1/orders/get-orders-requests-list/{skip}/",
            Method::GET,
            requests,
        )
        .route("/api/v1/orders/apply/", Method::POST, apply)
        .route("/api/v1/orders/reject/", Method::POST, reject)
        .route(
            "/api/v1/orders/compliance/create/",
            Method::POST,
            create_compliance,
        )
        .route(
            "/api/v1/orders/compliance/approve/",
            Method::POST,
            approve_compliance,
        )
        .route(
            "/api/v1/orders/compliance/reject/",
            Method::POST,
            reject_compliance,
        )
        .route(
            "/api/v1/orders/compliance/get-list/{skip}/",
            Method::GET,
            compliance_list,
        );
}

async fn create(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let order: Order = super::parse_body(&body)?;
    c.lifecycle.create(ctx.identity()?, order).await?;
    super::empty(StatusCode::CREATED)
}

async fn update(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let order: Order = super::parse_body(&body)?;
    c.lifecycle.update(ctx.identity()?, order).await?;
    super::empty(StatusCode::NO_CONTENT)
}

async fn delete(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    _body: Bytes,
) -> GatewayResult<Reply> {
    let order_id: u64 = ctx.param("order_id")?;
    c.lifecycle.delete(ctx.identity()?, order_id).await?;
    super::empty(StatusCode::NO_CONTENT)
}

async fn apply(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let basics: OrderBasics = super::parse_body(&body)?;
    c.lifecycle.apply(ctx.identity()?, basics).await?;
    super::empty(StatusCode::NO_CONTENT)
}

async fn reject(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let basics: OrderBasics = super::parse_body(&body)?;
    c.lifecycle.reject(ctx.identity()?, basics).await?;
    super::empty(StatusCode::NO_CONTENT)
}

async fn create_compliance(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let request: ComplianceRequest = super::parse_body(&body)?;
    c.lifecycle.create_compliance(ctx.identity()?, request).await?;
    super::empty(StatusCode::NO_CONTENT)
}

async fn approve_compliance(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let request: ComplianceRequest = super::parse_body(&body)?;
    c.lifecycle.approve_compliance(ctx.identity()?, request).await?;
    super::empty(StatusCode::NO_CONTENT)
}

async fn reject_compliance(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let request: ComplianceRequest = super::parse_body(&body)?;
    c.lifecycle.reject_compliance(ctx.identity()?, request).await?;
    super::empty(StatusCode::NO_CONTENT)
}

/// Customers list their own orders. Only the unfiltered first page is cached.
async fn list_by_filter(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let mut filter: OrdersFilter = super::parse_optional(&body)?;
    let identity = ctx.identity()?;
    if !identity.is_elevated() || filter.customer_id == 0 {
        filter.customer_id = identity.customer_id;
    }

    let orders = if filter.is_default_view() {
        let orders = c.backends.orders.clone();
        let query = filter.clone();
        c.read_through(
            &c.caches.filtered_orders_list,
            filter.customer_id,
            move || async move {
                orders
                    .get_orders_by_filter(&query)
                    .await
                    .map_err(GatewayError::from)
            },
        )
        .await?
    } else {
        c.backends.orders.get_orders_by_filter(&filter).await?
    };
    super::json(StatusCode::OK, &orders)
}

/// Order plus the rank of both parties. Only participants may look.
async fn details(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    _body: Bytes,
) -> GatewayResult<Reply> {
    let order_id: u64 = ctx.param("order_id")?;
    let identity = ctx.identity()?;

    let order = c
        .read_through(&c.caches.orders, order_id, || fetch_details(c.clone(), order_id))
        .await?;
    if !identity.is_elevated() && !order.order_basics.is_participant(identity.customer_id) {
        return Err(GatewayError::Forbidden(
            "forbidden: not allowed to access this resource".to_string(),
        ));
    }
    super::json(StatusCode::OK, &order)
}

async fn fetch_details(c: Arc<RequestCoordinator>, order_id: u64) -> GatewayResult<Order> {
    let mut order = c.backends.orders.get_order_details(order_id).await?;
    let customer_id = order.order_basics.customer_id;
    let applicant_id = order.order_basics.applicant_id;

    let customer_stats = c.backends.reviews.clone();
    let applicant_stats = c.backends.reviews.clone();
    let ranks = FanOut::new("order details")
        .task("get customer rank", async move {
            customer_stats
                .get_customer_stats(customer_id)
                .await
                .map(|stats| stats.rank)
                .map_err(GatewayError::from)
        })
        .task("get applicant rank", async move {
            applicant_stats
                .get_customer_stats(applicant_id)
                .await
                .map(|stats| stats.rank)
                .map_err(GatewayError::from)
        })
        .join()
        .await?;

    order.customer_rank = ranks.first().copied();
    order.applicant_rank = ranks.get(1).copied();
    Ok(order)
}

/// Orders the caller has been invited to.
async fn requests(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    _body: Bytes,
) -> GatewayResult<Reply> {
    let skip: u64 = ctx.param("skip")?;
    let applicant_id = ctx.identity()?.customer_id;
    let orders = c.backends.orders.clone();
    let fetch = move || async move {
        orders
            .get_order_requests(applicant_id, skip)
            .await
            .map_err(GatewayError::from)
    };

    let orders = if skip == 0 {
        c.read_through(&c.caches.orders_list, applicant_id, fetch)
            .await?
    } else {
        fetch().await?
    };
    super::json(StatusCode::OK, &orders)
}

async fn compliance_list(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    _body: Bytes,
) -> GatewayResult<Reply> {
    let skip: u64 = ctx.param("skip")?;
    let customer_id = ctx.identity()?.customer_id;
    let orders = c.backends.orders.clone();
    let fetch = move || async move {
        orders
            .get_compliance_requests(customer_id, skip)
            .await
            .map_err(GatewayError::from)
    };

    let list = if skip == 0 {
        c.read_through(&c.caches.compliance_requests_list, customer_id, fetch)
            .await?
    } else {
        fetch().await?
    };
    super::json(StatusCode::OK, &list)
}
