use hmac::{Hmac, Mac};
use log::{error, info};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;

use super::ports::PaymentGateway;
use crate::error::{CoreError, CoreResult};
use crate::models::{OrderDescriptor, OrderRequest};

const ORDERS_URL: &str = "https://api.razorpay.com/v1/orders";

#[derive(Debug, Deserialize)]
struct RazorpayOrder {
    id: String,
    /// Paise.
    amount: i64,
    currency: String,
}

pub struct RazorpayService {
    client: Client,
    key_id: Option<String>,
    key_secret: Option<String>,
}

impl RazorpayService {
    pub fn new(key_id: Option<String>, key_secret: Option<String>) -> Self {
        RazorpayService {
            client: Client::new(),
            key_id,
            key_secret,
        }
    }

    pub fn from_config() -> Self {
        Self::new(
            crate::config::Config::razorpay_key_id(),
            crate::config::Config::razorpay_key_secret(),
        )
    }

    fn credentials(&self) -> CoreResult<(&str, &str)> {
        match (self.key_id.as_deref(), self.key_secret.as_deref()) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(CoreError::transient("Payment gateway is not configured")),
        }
    }

    /// Checks the checkout signature: hex HMAC-SHA256 of `order_id|payment_id`
    /// keyed with the account secret.
    pub fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> CoreResult<()> {
        let (_, secret) = self.credentials()?;
        let signature = hex::decode(signature.trim())
            .map_err(|_| CoreError::validation("Invalid payment signature"))?;

        payment_mac(secret, order_id, payment_id)?
            .verify_slice(&signature)
            .map_err(|_| CoreError::validation("Invalid payment signature"))
    }
}

fn payment_mac(secret: &str, order_id: &str, payment_id: &str) -> CoreResult<Hmac<Sha256>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| CoreError::validation("Invalid HMAC key"))?;

    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    Ok(mac)
}

/// Hex signature the checkout sends back for a settled payment.
#[cfg(test)]
pub fn sign_payment(secret: &str, order_id: &str, payment_id: &str) -> CoreResult<String> {
    let mac = payment_mac(secret, order_id, payment_id)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[rocket::async_trait]
impl PaymentGateway for RazorpayService {
    async fn create_order(&self, request: &OrderRequest) -> CoreResult<OrderDescriptor> {
        let (key_id, key_secret) = self.credentials()?;

        let res = self
            .client
            .post(ORDERS_URL)
            .basic_auth(key_id, Some(key_secret))
            .json(&json!({
                "amount": request.amount * 100,
                "currency": "INR",
                "payment_capture": 1,
                "notes": {
                    "accountId": request.metadata.account_id,
                    "plan": request.metadata.plan,
                }
            }))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            error!("Razorpay order creation failed ({}): {}", status, body);
            return Err(CoreError::transient(format!(
                "Failed to create payment order ({})",
                status
            )));
        }

        let order: RazorpayOrder = res.json().await?;
        info!("Razorpay order {} created", order.id);

        Ok(OrderDescriptor {
            order_id: order.id,
            amount: order.amount / 100,
            currency: order.currency,
            key_id: Some(key_id.to_string()),
        })
    }
}
