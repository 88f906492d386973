//! Core types shared by every layer of the gateway
//!
//! Errors and the per-request context live here so the cache, backend and
//! orchestration modules do not depend on each other for them.

pub mod context;
pub mod error;

pub use context::RequestContext;
pub use error::{ErrorContext, GatewayError, GatewayResult};
