//! Anvil API gateway.
//!
//! A single HTTP entry point in front of the marketplace backends. Requests
//! are authorized, routed to a handler and answered by fanning out to the
//! backend services through [`orchestration::RequestCoordinator`], with a
//! cache-aside layer in front of the read paths.

pub mod auth;
pub mod backend;
pub mod cache;
pub mod config;
pub mod core;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod orchestration;
pub mod service;
pub(crate) mod utils;

#[cfg(test)]
pub(crate) mod testing;
