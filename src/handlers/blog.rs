use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};

use super::{Reply, Routes};
use crate::{
    auth::validate_ownership,
    core::{GatewayError, GatewayResult, RequestContext},
    model::{Post, PostReaction},
    orchestration::RequestCoordinator,
};

pub fn register(routes: &mut Routes) {
    routes
        .route("/api/v1/blog/create/", Method::POST, create)
        .route("/api/v1/blog/update/", Method::POST, update)
        .route("/api/v1/blog/get/{skip}/", Method::GET, list)
        .route("/api/v1/blog/delete/{post_id}/", Method::DELETE, delete)
        .route("/api/v1/blog/set-reaction/", Method::PATCH, set_reaction);
}

async fn create(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let post: Post = super::parse_body(&body)?;
    validate_ownership(ctx.identity()?, post.customer_id)?;

    c.caches.blog.delete(post.customer_id).await?;
    c.backends.blog.create_post(&post).await?;
    super::empty(StatusCode::CREATED)
}

async fn update(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let post: Post = super::parse_body(&body)?;
    validate_ownership(ctx.identity()?, post.customer_id)?;

    c.caches.blog.delete(post.customer_id).await?;
    c.backends.blog.update_post(&post).await?;
    super::empty(StatusCode::NO_CONTENT)
}

async fn list(c: Arc<RequestCoordinator>, ctx: RequestContext, _body: Bytes) -> GatewayResult<Reply> {
    let skip: u64 = ctx.param("skip")?;
    let customer_id = ctx.identity()?.customer_id;
    let blog = c.backends.blog.clone();
    let fetch = move || async move {
        blog.get_posts(customer_id, skip)
            .await
            .map_err(GatewayError::from)
    };

    let posts = if skip == 0 {
        c.read_through(&c.caches.blog, customer_id, fetch).await?
    } else {
        fetch().await?
    };
    super::json(StatusCode::OK, &posts)
}

async fn delete(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    _body: Bytes,
) -> GatewayResult<Reply> {
    let post_id: u64 = ctx.param("post_id")?;
    let customer_id = ctx.identity()?.customer_id;

    c.caches.blog.delete(customer_id).await?;
    c.backends.blog.delete_post(post_id, customer_id).await?;
    super::empty(StatusCode::NO_CONTENT)
}

async fn set_reaction(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let reaction: PostReaction = super::parse_body(&body)?;
    validate_ownership(ctx.identity()?, reaction.customer_id)?;

    c.backends.blog.set_reaction(&reaction).await?;
    super::empty(StatusCode::ACCEPTED)
}
