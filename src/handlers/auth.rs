use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use rand::Rng;

use super::{Reply, Routes};
use crate::{
    core::{GatewayError, GatewayResult, RequestContext},
    model::{EmailMessage, SignInRequest, SignUpRequest, TwoFactorCode},
    orchestration::RequestCoordinator,
};

pub fn register(routes: &mut Routes) {
    routes
        .route("/api/v1/auth/sign-up/", Method::POST, sign_up)
        .route("/api/v1/auth/sign-in/", Method::POST, sign_in);
}

async fn sign_up(
    c: Arc<RequestCoordinator>,
    _ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let request: SignUpRequest = super::parse_valid(&body)?;
    c.backends.profile.create_customer(&request).await?;
    super::empty(StatusCode::CREATED)
}

/// Accounts with two-step verification sign in twice: the first attempt
/// mails a code and answers 202, the second carries the code.
async fn sign_in(
    c: Arc<RequestCoordinator>,
    _ctx: RequestContext,
    body: Bytes,
) -> GatewayResult<Reply> {
    let request: SignInRequest = super::parse_valid(&body)?;
    let customer = c.backends.auth.get_customer(&request.email).await?;

    if customer.is_two_fa {
        if request.two_step_code.is_empty() {
            send_code(&c, &customer.email).await?;
            return super::message(StatusCode::ACCEPTED, "verification code sent");
        }
        verify_code(&c, &customer.email, &request.two_step_code).await?;
    }

    let tokens = c.backends.auth.sign_in(&request).await?;
    super::json(StatusCode::OK, &tokens)
}

const MAX_CODE_ATTEMPTS: u32 = 5;

fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// Store a fresh code under `2FA:{email}` and mail it.
pub(super) async fn send_code(c: &RequestCoordinator, email: &str) -> GatewayResult<()> {
    let code = generate_code();
    c.caches.two_factor.set(email, &TwoFactorCode::new(&code)).await?;
    c.backends
        .notifications
        .send_email(&EmailMessage {
            email: email.to_string(),
            subject: "Verification code".to_string(),
            body: format!("Your verification code is {code}"),
        })
        .await?;
    log::debug!("verification code sent to {email}");
    Ok(())
}

/// A code is good for one successful check and is dropped after
/// [`MAX_CODE_ATTEMPTS`] wrong ones.
pub(super) async fn verify_code(
    c: &RequestCoordinator,
    email: &str,
    code: &str,
) -> GatewayResult<()> {
    let mut expected = c
        .caches
        .two_factor
        .get(email)
        .await?
        .ok_or_else(|| GatewayError::Validation("code not found".to_string()))?;

    if expected.code != code {
        expected.attempts += 1;
        if expected.attempts >= MAX_CODE_ATTEMPTS {
            log::warn!(
                "verification code for {email} dropped after {MAX_CODE_ATTEMPTS} wrong attempts"
            );
            c.caches.two_factor.delete(email).await?;
        } else {
            c.caches.two_factor.set(email, &expected).await?;
        }
        return Err(GatewayError::Validation("invalid code".to_string()));
    }
    c.caches.two_factor.delete(email).await
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::testing::Harness;

    fn ctx() -> RequestContext {
        RequestContext::new(None, BTreeMap::new())
    }

    fn body(value: serde_json::Value) -> Bytes {
        Bytes::from(value.to_string())
    }

    #[test]
    fn test_generate_code() {
        let code = generate_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_sign_up_rejects_bad_email_locally() {
        let h = Harness::new();
        let err = sign_up(
            h.coordinator.clone(),
            ctx(),
            body(json!({"email": "nope", "password": "long enough"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.backend_calls(), 0);
    }

    #[tokio::test]
    async fn test_sign_in_without_two_step() {
        let h = Harness::new();
        h.auth.respond(
            "GetCustomer",
            json!({"customer_id": 1, "email": "a@b.cd", "is_two_fa": false}),
        );
        h.auth
            .respond("SignIn", json!({"access_token": "at", "refresh_token": "rt"}));

        let reply = sign_in(
            h.coordinator.clone(),
            ctx(),
            body(json!({"email": "a@b.cd", "password": "secret"})),
        )
        .await
        .unwrap();
        assert_eq!(reply.status(), StatusCode::OK);
        let tokens: serde_json::Value = serde_json::from_slice(reply.body()).unwrap();
        assert_eq!(tokens["access_token"], "at");
    }

    #[tokio::test]
    async fn test_sign_in_two_step_flow() {
        let h = Harness::new();
        h.auth.respond(
            "GetCustomer",
            json!({"customer_id": 1, "email": "a@b.cd", "is_two_fa": true}),
        );

        let reply = sign_in(
            h.coordinator.clone(),
            ctx(),
            body(json!({"email": "a@b.cd", "password": "secret"})),
        )
        .await
        .unwrap();
        assert_eq!(reply.status(), StatusCode::ACCEPTED);
        assert_eq!(h.auth.calls("SignIn"), 0);

        let code = h
            .coordinator
            .caches
            .two_factor
            .get("a@b.cd")
            .await
            .unwrap()
            .unwrap()
            .code;
        let mail = h.notifications.last_request("SendEmail").unwrap();
        assert!(mail["body"].as_str().unwrap().contains(&code));

        let err = sign_in(
            h.coordinator.clone(),
            ctx(),
            body(json!({"email": "a@b.cd", "password": "secret", "two_step_code": "bad"})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.public_message(), "invalid code");

        sign_in(
            h.coordinator.clone(),
            ctx(),
            body(json!({"email": "a@b.cd", "password": "secret", "two_step_code": code})),
        )
        .await
        .unwrap();
        assert_eq!(h.auth.calls("SignIn"), 1);

        // consumed
        let err = sign_in(
            h.coordinator.clone(),
            ctx(),
            body(json!({"email": "a@b.cd", "password": "secret", "two_step_code": code})),
        )
        .await
        .unwrap_err();
        assert_eq!(err.public_message(), "code not found");
    }

    #[tokio::test]
    async fn test_code_dropped_after_repeated_misses() {
        let h = Harness::new();
        let c = &h.coordinator;
        c.caches
            .two_factor
            .set("a@b.cd", &TwoFactorCode::new("123456"))
            .await
            .unwrap();

        for attempt in 1..MAX_CODE_ATTEMPTS {
            let err = verify_code(c, "a@b.cd", "000000").await.unwrap_err();
            assert_eq!(err.public_message(), "invalid code");
            let stored = c.caches.two_factor.get("a@b.cd").await.unwrap().unwrap();
            assert_eq!(stored.attempts, attempt);
        }

        let err = verify_code(c, "a@b.cd", "000000").await.unwrap_err();
        assert_eq!(err.public_message(), "invalid code");
        assert!(c.caches.two_factor.get("a@b.cd").await.unwrap().is_none());

        // the right code no longer helps
        let err = verify_code(c, "a@b.cd", "123456").await.unwrap_err();
        assert_eq!(err.public_message(), "code not found");
    }
}
