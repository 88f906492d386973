use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters long"))]
    pub password: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub two_step_code: String,
}

/// Account record returned by the identity backend for a login attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCustomer {
    pub customer_id: u64,
    pub email: String,
    #[serde(default)]
    pub is_two_fa: bool,
}

/// A mailed verification code and the wrong guesses made against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoFactorCode {
    pub code: String,
    #[serde(default)]
    pub attempts: u32,
}

impl TwoFactorCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            attempts: 0,
        }
    }
}
