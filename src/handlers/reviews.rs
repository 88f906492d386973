use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};

use super::{Reply, Routes};
use crate::{
    auth::validate_ownership,
    core::{GatewayError, GatewayResult, RequestContext},
    model::{Review, ReviewComment, ReviewReaction},
    orchestration::RequestCoordinator,
};

pub fn register(routes: &mut Routes) {
    routes
        .route("/api/v1/reviews/create/", Method::POST, create)
        .route("/api/v1/reviews/update/", Method::PUT, update)
        .route(
            "/api/v1/reviews/get-reviews-list/{skip}/",
            Method::GET,
            list,
        )
        .route("/api/v1/reviews/delete/{review_id}/", Method::DELETE, delete)
        .route(
            "/api/v1/reviews/add-review-comment/",
            Method::POST,
            add_comment,
        )
        .route(
            "/api/v1/reviews/get-review-comments-list/{review_id}/{skip}/",
            Method::GET,
            comments,
        )
        .route(
            "/api/v1/reviews/set-review-reaction/",
            Method::POST,
            set_reaction,
        );
}

fn validate_rating(review: &Review) -> GatewayResult<()> {
    if (1..=5).contains(&review.rating) {
        Ok(())
    } else {
        Err(GatewayError::Validation(
            "rating must be between 1 and 5".to_string(),
        ))
    }
}

/// Only customers who shared an order may review each other.
async fn create(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let review: Review = super::parse_body(&body)?;
    validate_ownership(ctx.identity()?, review.reviewer_id)?;
    validate_rating(&review)?;
    if review.reviewer_id == review.customer_id {
        return Err(GatewayError::Validation(
            "you cannot review yourself".to_string(),
        ));
    }

    let related = match c
        .backends
        .orders
        .validate_customers_relation(review.reviewer_id, review.customer_id)
        .await
    {
        Ok(offer_id) => offer_id != 0,
        Err(e) if e.is_not_found() => false,
        Err(e) => return Err(e.into()),
    };
    if !related {
        return Err(GatewayError::Forbidden(
            "You can only review customers you have worked with".to_string(),
        ));
    }

    c.backends.reviews.create_review(&review).await?;
    super::empty(StatusCode::CREATED)
}

async fn update(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let review: Review = super::parse_body(&body)?;
    validate_ownership(ctx.identity()?, review.reviewer_id)?;
    validate_rating(&review)?;

    c.caches.reviews.delete(review.review_id).await?;
    c.backends.reviews.update_review(&review).await?;
    super::empty(StatusCode::NO_CONTENT)
}

async fn list(c: Arc<RequestCoordinator>, ctx: RequestContext, _body: Bytes) -> GatewayResult<Reply> {
    let skip: u64 = ctx.param("skip")?;
    let reviews = c
        .backends
        .reviews
        .get_reviews(ctx.identity()?.customer_id, skip)
        .await?;
    super::json(StatusCode::OK, &reviews)
}

async fn delete(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    _body: Bytes,
) -> GatewayResult<Reply> {
    let review_id: u64 = ctx.param("review_id")?;
    let customer_id = ctx.identity()?.customer_id;

    c.caches.reviews.delete(review_id).await?;
    c.caches.reviews_comments.delete(review_id).await?;
    c.backends.reviews.delete_review(review_id, customer_id).await?;
    super::empty(StatusCode::NO_CONTENT)
}

async fn add_comment(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let comment: ReviewComment = super::parse_body(&body)?;
    validate_ownership(ctx.identity()?, comment.author_id)?;
    if comment.body.trim().is_empty() {
        return Err(GatewayError::Validation("comment is empty".to_string()));
    }

    c.caches.reviews_comments.delete(comment.review_id).await?;
    c.backends.reviews.add_comment(&comment).await?;
    super::empty(StatusCode::CREATED)
}

async fn comments(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    _body: Bytes,
) -> GatewayResult<Reply> {
    let review_id: u64 = ctx.param("review_id")?;
    let skip: u64 = ctx.param("skip")?;
    let reviews = c.backends.reviews.clone();
    let fetch = move || async move {
        reviews
            .get_comments(review_id, skip)
            .await
            .map_err(GatewayError::from)
    };

    let comments = if skip == 0 {
        c.read_through(&c.caches.reviews_comments, review_id, fetch)
            .await?
    } else {
        fetch().await?
    };
    super::json(StatusCode::OK, &comments)
}

async fn set_reaction(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let reaction: ReviewReaction = super::parse_body(&body)?;
    validate_ownership(ctx.identity()?, reaction.customer_id)?;

    c.caches.reviews.delete(reaction.review_id).await?;
    c.backends.reviews.set_reaction(&reaction).await?;
    super::empty(StatusCode::ACCEPTED)
}
