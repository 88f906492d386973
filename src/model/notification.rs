use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub notification_id: u64,
    pub customer_id: u64,
    pub title: String,
    pub body: String,
    pub area: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub is_read: bool,
}

impl Notification {
    pub fn new(customer_id: u64, area: &str, title: &str, body: impl Into<String>) -> Self {
        Self {
            notification_id: 0,
            customer_id,
            title: title.to_string(),
            body: body.into(),
            area: area.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            is_read: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub email: String,
    pub subject: String,
    pub body: String,
}
