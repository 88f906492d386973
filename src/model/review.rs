use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub review_id: u64,
    /// Author of the review.
    pub reviewer_id: u64,
    /// Customer being reviewed.
    pub customer_id: u64,
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub body: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewComment {
    #[serde(default)]
    pub comment_id: u64,
    pub review_id: u64,
    pub author_id: u64,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReaction {
    pub review_id: u64,
    pub customer_id: u64,
    pub reaction: String,
}
