//! Request context management
//!
//! [`RequestContext`] carries what the gateway learns about a request
//! before the handler runs: its id, the caller identity and the path
//! parameters captured by the router.

use std::{collections::BTreeMap, str::FromStr, time::Instant};

use super::error::{GatewayError, GatewayResult};
use crate::model::Identity;

pub struct RequestContext {
    pub request_id: String,
    pub request_start: Instant,
    /// `None` only on routes that bypass authorization.
    pub identity: Option<Identity>,
    pub params: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new(identity: Option<Identity>, params: BTreeMap<String, String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            request_start: Instant::now(),
            identity,
            params,
        }
    }

    /// Caller identity; only fails on a route mounted without the gate.
    pub fn identity(&self) -> GatewayResult<&Identity> {
        self.identity
            .as_ref()
            .ok_or_else(|| GatewayError::Unauthenticated("Unauthorized".to_string()))
    }

    /// Typed path parameter.
    pub fn param<T: FromStr>(&self, name: &str) -> GatewayResult<T> {
        let raw = self
            .params
            .get(name)
            .ok_or_else(|| GatewayError::Validation(format!("missing path parameter {name}")))?;
        raw.parse()
            .map_err(|_| GatewayError::Validation(format!("invalid {name}: {raw}")))
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.request_start.elapsed().as_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_param_parsing() {
        let ctx = RequestContext::new(None, params(&[("orderId", "42"), ("skip", "x")]));
        assert_eq!(ctx.param::<u64>("orderId").unwrap(), 42);
        assert!(matches!(
            ctx.param::<u64>("skip"),
            Err(GatewayError::Validation(ref m)) if m == "invalid skip: x"
        ));
        assert!(matches!(
            ctx.param::<u64>("offerId"),
            Err(GatewayError::Validation(_))
        ));
    }

    #[test]
    fn test_identity_required() {
        let ctx = RequestContext::new(None, BTreeMap::new());
        assert!(matches!(ctx.identity(), Err(GatewayError::Unauthenticated(_))));

        let ctx = RequestContext::new(
            Some(Identity {
                customer_id: 1,
                email: "a@b.c".into(),
                role: Role::Customer,
            }),
            BTreeMap::new(),
        );
        assert_eq!(ctx.identity().unwrap().customer_id, 1);
        assert_eq!(ctx.request_id.len(), 36);
    }
}
