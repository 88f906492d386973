//! Request orchestration layer
//!
//! Sits between the HTTP handlers and the backends: cache-or-fetch
//! decisions, concurrent fan-out over backend services and the order
//! lifecycle rules.

pub mod coordinator;
pub mod fanout;
pub mod lifecycle;

pub use coordinator::RequestCoordinator;
pub use fanout::FanOut;
pub use lifecycle::OrderLifecycleController;
