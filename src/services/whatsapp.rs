//! WhatsApp click-to-chat adapter.
//!
//! Nothing is sent from the server. Each reminder becomes a `wa.me` link in an
//! outbox; the admin console drains the outbox and opens the links.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::{info, warn};
use reqwest::Url;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;

use super::ports::MessagingChannel;
use crate::error::{CoreError, CoreResult};
use crate::utils::validate_mobile;

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub phone: String,
    pub url: String,
    pub queued_at: DateTime<Utc>,
}

/// Links kept while nobody drains the outbox. Older ones are dropped first.
pub const OUTBOX_CAPACITY: usize = 500;

pub struct WhatsAppChannel {
    country_code: String,
    capacity: usize,
    outbox: Mutex<VecDeque<OutboxEntry>>,
}

impl WhatsAppChannel {
    pub fn new(country_code: impl Into<String>) -> Self {
        WhatsAppChannel {
            country_code: country_code.into(),
            capacity: OUTBOX_CAPACITY,
            outbox: Mutex::new(VecDeque::new()),
        }
    }

    /// Digits-only international number. Ten-digit local numbers get the
    /// country code prepended.
    pub fn international_number(&self, phone: &str) -> CoreResult<String> {
        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        match digits.len() {
            0 => Err(CoreError::validation("Phone number is empty")),
            10 if validate_mobile(&digits) => Ok(format!("{}{}", self.country_code, digits)),
            10 => Err(CoreError::validation(format!("Invalid mobile number {}", phone))),
            _ => Ok(digits),
        }
    }

    pub fn chat_url(&self, phone: &str, text: &str) -> CoreResult<Url> {
        let number = self.international_number(phone)?;
        Url::parse_with_params(&format!("https://wa.me/{}", number), &[("text", text)])
            .map_err(|e| CoreError::validation(format!("Invalid chat link: {}", e)))
    }

    /// Hands every queued link to the caller and empties the outbox.
    pub fn drain(&self) -> Vec<OutboxEntry> {
        match self.outbox.lock() {
            Ok(mut outbox) => outbox.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }
}

#[rocket::async_trait]
impl MessagingChannel for WhatsAppChannel {
    async fn open_external_thread(&self, phone: &str, text: &str) -> CoreResult<()> {
        let url = self.chat_url(phone, text)?;
        let entry = OutboxEntry {
            phone: phone.to_string(),
            url: url.to_string(),
            queued_at: Utc::now(),
        };

        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| CoreError::transient("Reminder outbox is unavailable"))?;
        while outbox.len() >= self.capacity.max(1) {
            if let Some(dropped) = outbox.pop_front() {
                warn!("Outbox full, dropping undrained link for {}", dropped.phone);
            }
        }
        outbox.push_back(entry);
        info!("Queued WhatsApp reminder for {}", phone);
        Ok(())
    }
}
