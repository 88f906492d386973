//! Wire shapes exchanged with clients and backend services.
//!
//! The gateway owns none of these resources; it only caches projections of
//! them. Fields the gateway never inspects are kept as opaque JSON so they
//! pass through unchanged.

mod auth;
mod blog;
mod identity;
mod notification;
mod offer;
mod order;
mod profile;
mod review;

pub use auth::{AuthCustomer, SignInRequest, SignUpRequest, TwoFactorCode};
pub use blog::{Post, PostReaction};
pub use identity::{Identity, Role};
pub use notification::{EmailMessage, Notification};
pub use offer::{Applicant, ApplyToOfferRequest, Offer, OfferDetails};
pub use order::{
    ComplianceRequest, Order, OrderBasics, OrderDetails, OrderStatus, OrdersFilter,
    PaymentDetails, PaymentRound,
};
pub use profile::{
    ChangeEmailRequest, ChangePasswordRequest, ChangeTwoStepStatusRequest, CustomerProfile,
    Profile, ReportRequest, Stats,
};
pub use review::{Review, ReviewComment, ReviewReaction};

use validator::ValidationErrors;

/// First human readable message out of a validation failure.
pub fn validation_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .next()
        .map(|err| match &err.message {
            Some(message) => message.to_string(),
            None => err.code.to_string(),
        })
        .unwrap_or_else(|| errors.to_string())
}
