use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};

use super::{Reply, Routes};
use crate::{
    auth::validate_ownership,
    core::{GatewayError, GatewayResult, RequestContext},
    model::{Profile, ReportRequest},
    orchestration::RequestCoordinator,
};

pub fn register(routes: &mut Routes) {
    routes
        .route("/api/v1/profile/get/", Method::GET, get_profile)
        .route("/api/v1/profile/update/", Method::POST, update_profile)
        .route("/api/v1/profile/fill/", Method::POST, fill_profile)
        .route(
            "/api/v1/profile/get-public-profile/",
            Method::GET,
            get_public_profile,
        )
        .route(
            "/api/v1/profile/get-public-profile/{customer_id}/",
            Method::GET,
            get_public_profile,
        )
        .route("/api/v1/profile/report/", Method::POST, report);
}

async fn get_profile(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    _body: Bytes,
) -> GatewayResult<Reply> {
    let customer_id = ctx.identity()?.customer_id;
    let profile = c
        .read_through(&c.caches.customer, customer_id, || {
            c.assemble_profile(customer_id, false)
        })
        .await?;
    super::json(StatusCode::OK, &profile)
}

async fn update_profile(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let profile: Profile = super::parse_body(&body)?;
    validate_ownership(ctx.identity()?, profile.customer_id)?;
    let customer_id = profile.customer_id;

    invalidate(&c, customer_id).await?;
    c.backends.profile.update_profile(&profile).await?;

    let refreshed = c
        .read_through(&c.caches.customer, customer_id, || {
            c.assemble_profile(customer_id, false)
        })
        .await?;
    super::json(StatusCode::OK, &refreshed)
}

async fn fill_profile(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let profile: Profile = super::parse_body(&body)?;
    validate_ownership(ctx.identity()?, profile.customer_id)?;

    invalidate(&c, profile.customer_id).await?;
    c.backends.profile.fill_profile(&profile).await?;
    super::empty(StatusCode::NO_CONTENT)
}

/// Without a path parameter the caller's own public profile is returned.
async fn get_public_profile(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    _body: Bytes,
) -> GatewayResult<Reply> {
    let customer_id = if ctx.params.contains_key("customer_id") {
        ctx.param::<u64>("customer_id")?
    } else {
        ctx.identity()?.customer_id
    };

    let profile = c
        .read_through(&c.caches.public_profile, customer_id, || {
            c.assemble_profile(customer_id, true)
        })
        .await?;
    super::json(StatusCode::OK, &profile)
}

async fn report(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let request: ReportRequest = super::parse_body(&body)?;
    validate_ownership(ctx.identity()?, request.reporter_id)?;
    if request.reporter_id == request.customer_id {
        return Err(GatewayError::Validation(
            "you cannot report yourself".to_string(),
        ));
    }

    c.backends.profile.report_customer(&request).await?;
    super::empty(StatusCode::NO_CONTENT)
}

/// Drop both cached views of a customer's profile.
pub(super) async fn invalidate(c: &RequestCoordinator, customer_id: u64) -> GatewayResult<()> {
    c.caches.customer.delete(customer_id).await?;
    c.caches.public_profile.delete(customer_id).await
}
