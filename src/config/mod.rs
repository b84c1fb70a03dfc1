use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use rocket::Config as RocketConfig;
use std::env;
use std::time::Duration;

use crate::services::reminder::DEFAULT_SEND_INTERVAL;

pub struct Config;

impl Config {
    fn figment() -> Figment {
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed("ROCKET_").split("_"))
    }

    /// Key that access tokens are verified with. There is no fallback.
    pub fn jwt_secret() -> Option<String> {
        Self::figment()
            .extract_inner::<String>("jwt_secret")
            .ok()
            .filter(|secret| !secret.trim().is_empty())
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
    }

    pub fn mongodb_database() -> String {
        Self::figment()
            .extract_inner("mongodb_database")
            .unwrap_or_else(|_| "usi-library".to_string())
    }

    pub fn razorpay_key_id() -> Option<String> {
        Self::figment()
            .extract_inner("razorpay_key_id")
            .ok()
    }

    pub fn razorpay_key_secret() -> Option<String> {
        Self::figment()
            .extract_inner("razorpay_key_secret")
            .ok()
    }

    pub fn is_razorpay_enabled() -> bool {
        Self::razorpay_key_id().is_some()
            && Self::razorpay_key_secret().is_some()
    }

    /// Dialling prefix put in front of stored ten-digit numbers.
    pub fn whatsapp_country_code() -> String {
        Self::figment()
            .extract_inner("whatsapp_country_code")
            .unwrap_or_else(|_| "91".to_string())
    }

    pub fn institute_name() -> String {
        Self::figment()
            .extract_inner("institute_name")
            .unwrap_or_else(|_| "Ultimate Success Institute".to_string())
    }

    /// Gap between two reminders of a bulk send.
    pub fn reminder_interval() -> Duration {
        Self::figment()
            .extract_inner("reminder_interval_ms")
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SEND_INTERVAL)
    }

    pub fn session_ttl_secs() -> i64 {
        Self::figment()
            .extract_inner("session_ttl_secs")
            .unwrap_or(300)
    }
}
