use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::profile::CustomerProfile;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferDetails {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    #[serde(default)]
    pub offer_id: u64,
    pub posted_by: u64,
    #[serde(default)]
    pub offer_details: OfferDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyToOfferRequest {
    pub offer_id: u64,
    pub applicant_id: u64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applicant {
    pub customer_id: u64,
    pub offer_id: u64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<CustomerProfile>,
}
