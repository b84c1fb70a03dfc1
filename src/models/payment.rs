use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::PlanSelection;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// One self-serve payment attempt.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub order_id: String,
    pub account_id: String,
    pub plan_selection: PlanSelection,
    pub amount: i64,
    pub status: PaymentStatus,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata attached to a gateway order so the payment can be traced back.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderMetadata {
    pub account_id: String,
    pub plan: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    /// Whole rupees.
    pub amount: i64,
    pub metadata: OrderMetadata,
}

/// What the gateway hands back after creating an order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDescriptor {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    /// Public key the checkout widget needs.
    pub key_id: Option<String>,
}

/// Returned to the client to open the checkout.
#[derive(Debug, Serialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub order: OrderDescriptor,
    pub plan: String,
    pub plan_selection: PlanSelection,
    pub amount: i64,
}

/// Confirmation signal delivered after the gateway settles (or rejects) a payment.
#[derive(Debug, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub success: bool,
    pub order_id: String,
    pub payment_id: Option<String>,
}
