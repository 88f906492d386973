use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Rounding slack allowed when comparing round amounts with the price.
const PRICE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Applied,
    Pending,
    Completed,
    Rejected,
}

impl OrderStatus {
    /// Orders in this state may only be changed by an elevated role.
    pub fn requires_elevation(self) -> bool {
        self == OrderStatus::Applied
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderBasics {
    pub customer_id: u64,
    pub applicant_id: u64,
    pub offer_id: u64,
    pub order_id: u64,
}

impl OrderBasics {
    pub fn is_participant(&self, customer_id: u64) -> bool {
        self.customer_id == customer_id || self.applicant_id == customer_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentRound {
    #[serde(default)]
    pub id: u64,
    pub round: u32,
    pub amount: f64,
    #[serde(default)]
    pub paid_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(default)]
    pub total_price: f64,
    pub round_amount: u32,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub payment_rounds: Vec<PaymentRound>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "Order::validate_payment_rounds"))]
pub struct Order {
    #[serde(default)]
    pub order_basics: OrderBasics,
    pub order_details: OrderDetails,
    pub payment_details: PaymentDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_rank: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_rank: Option<f64>,
}

impl Order {
    /// The rounds of a payment plan must add up to the order price.
    fn validate_payment_rounds(&self) -> Result<(), ValidationError> {
        let total: f64 = self
            .payment_details
            .payment_rounds
            .iter()
            .map(|round| round.amount)
            .sum();

        if (total - self.order_details.price).abs() > PRICE_EPSILON {
            return Err(ValidationError::new("payment_rounds_mismatch").with_message(
                "total sum of payment rounds is not equal to the order price".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRequest {
    #[serde(default)]
    pub id: u64,
    pub round: u32,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub claim: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub order_basics: OrderBasics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrdersFilter {
    #[serde(default)]
    pub customer_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub skip: u64,
}

impl OrdersFilter {
    /// Only the unfiltered first page is worth caching per customer.
    pub fn is_default_view(&self) -> bool {
        self.status.is_none() && self.skip == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::validation_message;

    fn order(price: f64, rounds: &[f64]) -> Order {
        Order {
            order_details: OrderDetails {
                price,
                ..Default::default()
            },
            payment_details: PaymentDetails {
                round_amount: rounds.len() as u32,
                payment_rounds: rounds
                    .iter()
                    .enumerate()
                    .map(|(i, amount)| PaymentRound {
                        round: i as u32 + 1,
                        amount: *amount,
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_payment_rounds_match_price() {
        assert!(order(300.0, &[100.0, 100.0, 100.0]).validate().is_ok());
        assert!(order(0.3, &[0.1, 0.2]).validate().is_ok());
    }

    #[test]
    fn test_payment_rounds_mismatch() {
        let err = order(300.0, &[100.0, 150.0]).validate().unwrap_err();
        assert_eq!(
            validation_message(&err),
            "total sum of payment rounds is not equal to the order price"
        );
    }

    #[test]
    fn test_status_wire_format() {
        let status: OrderStatus = serde_json::from_str("\"APPLIED\"").unwrap();
        assert!(status.requires_elevation());
        assert!(!OrderStatus::Pending.requires_elevation());
    }
}
