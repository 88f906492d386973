use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use serde_json::Value;

use super::{Reply, Routes};
use crate::{
    auth::validate_ownership,
    core::{GatewayError, GatewayResult, RequestContext},
    model::{Applicant, ApplyToOfferRequest, Notification, Offer},
    orchestration::{FanOut, RequestCoordinator},
};

const AREA: &str = "offers";

pub fn register(routes: &mut Routes) {
    routes
        .route("/api/v1/offers/create/", Method::POST, create)
        .route("/api/v1/offers/update/", Method::POST, update)
        .route("/api/v1/offers/get-offers-list/", Method::POST, list)
        .route("/api/v1/offers/get-my-offers/", Method::POST, my_offers)
        .route("/api/v1/offers/delete/{offer_id}/", Method::DELETE, delete)
        .route(
            "/api/v1/offers/get-offer-details/{offer_id}/",
            Method::GET,
            details,
        )
        .route("/api/v1/offers/apply/", Method::POST, apply)
        .route(
            "/api/v1/offers/get-applicants-list/{offer_id}/{skip}/",
            Method::GET,
            applicants,
        );
}

async fn create(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let offer: Offer = super::parse_body(&body)?;
    validate_ownership(ctx.identity()?, offer.posted_by)?;

    c.backends.offers.create_offer(&offer).await?;
    super::empty(StatusCode::CREATED)
}

async fn update(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let offer: Offer = super::parse_body(&body)?;
    validate_ownership(ctx.identity()?, offer.posted_by)?;

    c.caches.offers.delete(offer.offer_id).await?;
    c.backends.offers.update_offer(&offer).await?;
    super::empty(StatusCode::NO_CONTENT)
}

/// The filter is handed to the offers service untouched.
async fn list(c: Arc<RequestCoordinator>, _ctx: RequestContext, body: Bytes) -> GatewayResult<Reply> {
    let filter: Value = super::parse_optional(&body)?;
    let offers = c.backends.offers.get_offers_list(&filter).await?;
    super::json(StatusCode::OK, &offers)
}

async fn my_offers(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let filter: Value = super::parse_optional(&body)?;
    let offers = c
        .backends
        .offers
        .get_my_offers(ctx.identity()?.customer_id, &filter)
        .await?;
    super::json(StatusCode::OK, &offers)
}

async fn delete(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    _body: Bytes,
) -> GatewayResult<Reply> {
    let offer_id: u64 = ctx.param("offer_id")?;
    let customer_id = ctx.identity()?.customer_id;

    c.caches.offers.delete(offer_id).await?;
    c.caches.applicants.delete(offer_id).await?;
    c.backends.offers.delete_offer(offer_id, customer_id).await?;
    super::empty(StatusCode::NO_CONTENT)
}

async fn details(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    _body: Bytes,
) -> GatewayResult<Reply> {
    let offer_id: u64 = ctx.param("offer_id")?;
    let offer = fetch_offer(&c, offer_id).await?;
    super::json(StatusCode::OK, &offer)
}

async fn apply(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let request: ApplyToOfferRequest = super::parse_body(&body)?;
    validate_ownership(ctx.identity()?, request.applicant_id)?;

    let offer = fetch_offer(&c, request.offer_id).await?;
    if offer.posted_by == request.applicant_id {
        return Err(GatewayError::Validation(
            "you cannot apply to your own offer".to_string(),
        ));
    }

    c.caches.applicants.delete(request.offer_id).await?;
    c.backends.offers.apply_to_offer(&request).await?;

    let notification = Notification::new(
        offer.posted_by,
        AREA,
        "New Application",
        format!("Someone applied to your offer #{}", request.offer_id),
    );
    c.backends
        .notifications
        .create_notification(&notification)
        .await?;
    super::empty(StatusCode::NO_CONTENT)
}

/// First page is cached per offer; every applicant is enriched with its
/// public profile, fetched concurrently.
async fn applicants(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    _body: Bytes,
) -> GatewayResult<Reply> {
    let offer_id: u64 = ctx.param("offer_id")?;
    let skip: u64 = ctx.param("skip")?;

    let list = if skip == 0 {
        c.read_through(&c.caches.applicants, offer_id, || {
            fetch_applicants(c.clone(), offer_id, 0)
        })
        .await?
    } else {
        fetch_applicants(c.clone(), offer_id, skip).await?
    };
    super::json(StatusCode::OK, &list)
}

async fn fetch_offer(c: &RequestCoordinator, offer_id: u64) -> GatewayResult<Offer> {
    c.read_through(&c.caches.offers, offer_id, || async move {
        c.backends
            .offers
            .get_offer_details(offer_id)
            .await
            .map_err(GatewayError::from)
    })
    .await
}

async fn fetch_applicants(
    c: Arc<RequestCoordinator>,
    offer_id: u64,
    skip: u64,
) -> GatewayResult<Vec<Applicant>> {
    let applicants = c.backends.offers.get_applicants(offer_id, skip).await?;
    if applicants.is_empty() {
        return Ok(applicants);
    }

    let mut profiles = FanOut::new("applicants list");
    for applicant in &applicants {
        let c = c.clone();
        let customer_id = applicant.customer_id;
        profiles = profiles.task("get applicant profile", async move {
            c.read_through(&c.caches.public_profile, customer_id, || {
                c.assemble_profile(customer_id, true)
            })
            .await
        });
    }
    let profiles = profiles.join().await?;

    Ok(applicants
        .into_iter()
        .zip(profiles)
        .map(|(applicant, profile)| Applicant {
            profile: Some(profile),
            ..applicant
        })
        .collect())
}
