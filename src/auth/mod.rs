//! Caller authentication and authorization.
//!
//! The gate resolves the bearer token into an [`Identity`] through the
//! identity backend. Mutating endpoints then call [`validate_ownership`]
//! with the customer id carried by the payload; there is no finer grained
//! access control.

use http::HeaderMap;

use crate::{
    backend::AuthClient,
    core::{GatewayError, GatewayResult},
    model::Identity,
    utils::request,
};

/// Paths served without a credential.
const PUBLIC_PREFIXES: &[&str] = &["/api/v1/auth/", "/health", "/metrics"];

const ADMIN_PREFIX: &str = "/api/v1/admin/";

pub struct AuthorizationGate {
    auth: AuthClient,
}

impl AuthorizationGate {
    pub fn new(auth: AuthClient) -> Self {
        Self { auth }
    }

    pub fn is_public(path: &str) -> bool {
        PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
    }

    /// `Ok(None)` for public paths, the caller identity otherwise.
    pub async fn authorize(
        &self,
        path: &str,
        headers: &HeaderMap,
    ) -> GatewayResult<Option<Identity>> {
        if Self::is_public(path) {
            return Ok(None);
        }

        let token = request::bearer_token(headers)
            .ok_or_else(|| GatewayError::Unauthenticated("Unauthorized".to_string()))?;

        let identity = self.auth.validate_token(token).await.map_err(|e| {
            log::debug!("token rejected: {e}");
            GatewayError::Unauthenticated(e.message)
        })?;

        if path.starts_with(ADMIN_PREFIX) && !identity.is_elevated() {
            log::warn!(
                "customer {} denied access to {path}",
                identity.customer_id
            );
            return Err(GatewayError::Forbidden("Forbidden".to_string()));
        }

        Ok(Some(identity))
    }
}

/// The payload must belong to the caller.
pub fn validate_ownership(identity: &Identity, owner_id: u64) -> GatewayResult<()> {
    if identity.customer_id == owner_id {
        Ok(())
    } else {
        Err(GatewayError::Forbidden(
            "forbidden: not allowed to access this resource".to_string(),
        ))
    }
}
