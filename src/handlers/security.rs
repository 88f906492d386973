use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use validator::ValidateEmail;

use super::{auth, profile, Reply, Routes};
use crate::{
    auth::validate_ownership,
    core::{GatewayError, GatewayResult, RequestContext},
    model::{ChangeEmailRequest, ChangePasswordRequest, ChangeTwoStepStatusRequest},
    orchestration::RequestCoordinator,
};

pub fn register(routes: &mut Routes) {
    routes
        .route(
            "/api/v1/profile/security/change-two-step-status/",
            Method::PATCH,
            change_two_step_status,
        )
        .route(
            "/api/v1/profile/security/update/change-password/",
            Method::PATCH,
            change_password,
        )
        .route(
            "/api/v1/profile/security/update/change-email/",
            Method::PATCH,
            change_email,
        );
}

/// Enabling is immediate. Disabling needs a mailed code: without one the
/// code is sent and 202 returned.
async fn change_two_step_status(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let request: ChangeTwoStepStatusRequest = super::parse_body(&body)?;
    let identity = ctx.identity()?;
    validate_ownership(identity, request.customer_id)?;
    if request.email != identity.email {
        return Err(GatewayError::Forbidden(
            "forbidden: email does not match".to_string(),
        ));
    }

    if !request.is_enabled {
        if request.code.is_empty() {
            auth::send_code(&c, &request.email).await?;
            return super::message(StatusCode::ACCEPTED, "verification code sent");
        }
        auth::verify_code(&c, &request.email, &request.code).await?;
    }

    c.backends.profile.change_two_step_status(&request).await?;
    super::message(StatusCode::OK, "two-step verification status changed")
}

async fn change_password(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let request: ChangePasswordRequest = super::parse_body(&body)?;
    validate_ownership(ctx.identity()?, request.customer_id)?;
    if request.new_password.len() < 8 {
        return Err(GatewayError::Validation(
            "password must be at least 8 characters long".to_string(),
        ));
    }

    c.backends.profile.change_password(&request).await?;
    super::empty(StatusCode::NO_CONTENT)
}

async fn change_email(
    c: Arc<RequestCoordinator>,
    ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let request: ChangeEmailRequest = super::parse_body(&body)?;
    let identity = ctx.identity()?;
    validate_ownership(identity, request.customer_id)?;
    if request.old_email != identity.email {
        return Err(GatewayError::Forbidden(
            "forbidden: email does not match".to_string(),
        ));
    }
    if !request.new_email.validate_email() {
        return Err(GatewayError::Validation("invalid email address".to_string()));
    }

    profile::invalidate(&c, request.customer_id).await?;
    c.backends.profile.change_email(&request).await?;
    super::empty(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::testing::{customer, Harness};

    fn ctx() -> RequestContext {
        RequestContext::new(Some(customer(3)), BTreeMap::new())
    }

    fn body(value: serde_json::Value) -> Bytes {
        Bytes::from(value.to_string())
    }

    #[tokio::test]
    async fn test_disable_two_step_needs_code() {
        let h = Harness::new();
        let request = json!({"customer_id": 3, "email": "customer3@example.com", "is_enabled": false});

        let reply = change_two_step_status(h.coordinator.clone(), ctx(), body(request.clone()))
            .await
            .unwrap();
        assert_eq!(reply.status(), StatusCode::ACCEPTED);
        assert_eq!(h.profile.calls("ChangeTwoStepStatus"), 0);

        let code = h
            .coordinator
            .caches
            .two_factor
            .get("customer3@example.com")
            .await
            .unwrap()
            .unwrap()
            .code;
        let mut with_code = request;
        with_code["code"] = json!(code);
        let reply = change_two_step_status(h.coordinator.clone(), ctx(), body(with_code))
            .await
            .unwrap();
        assert_eq!(reply.status(), StatusCode::OK);
        assert_eq!(h.profile.calls("ChangeTwoStepStatus"), 1);
    }

    #[tokio::test]
    async fn test_two_step_for_other_email_is_forbidden() {
        let h = Harness::new();
        let err = change_two_step_status(
            h.coordinator.clone(),
            ctx(),
            body(json!({"customer_id": 3, "email": "x@y.zz", "is_enabled": true})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(h.backend_calls(), 0);
    }

    #[tokio::test]
    async fn test_change_email_invalidates_profile() {
        let h = Harness::new();
        let caches = &h.coordinator.caches;
        caches.customer.set(3, &Default::default()).await.unwrap();

        let reply = change_email(
            h.coordinator.clone(),
            ctx(),
            body(json!({
                "customer_id": 3,
                "old_email": "customer3@example.com",
                "new_email": "new@example.com"
            })),
        )
        .await
        .unwrap();
        assert_eq!(reply.status(), StatusCode::NO_CONTENT);
        assert!(caches.customer.get(3).await.unwrap().is_none());
        assert_eq!(h.profile.calls("ChangeCustomerEmail"), 1);
    }

    #[tokio::test]
    async fn test_change_password_for_someone_else() {
        let h = Harness::new();
        let err = change_password(
            h.coordinator.clone(),
            ctx(),
            body(json!({"customer_id": 4, "old_password": "a", "new_password": "bbbbbbbbb"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
