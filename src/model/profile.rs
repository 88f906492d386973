use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub customer_id: u64,
    #[serde(default)]
    pub email: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Aggregated counters kept by the orders and reviews services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub rank: f64,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Profile assembled from the profile, orders and reviews services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub profile: Profile,
    #[serde(default)]
    pub orders_stats: Stats,
    #[serde(default)]
    pub reviews_stats: Stats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub reporter_id: u64,
    pub customer_id: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeTwoStepStatusRequest {
    pub customer_id: u64,
    pub email: String,
    pub is_enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub customer_id: u64,
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEmailRequest {
    pub customer_id: u64,
    pub old_email: String,
    pub new_email: String,
}
