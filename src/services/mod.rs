pub mod accounts;
pub mod classifier;
pub mod jwt;
pub mod ports;
pub mod pricing;
pub mod razorpay;
pub mod reminder;
pub mod renewal;
pub mod session;
pub mod whatsapp;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use log::{error, info, warn};
use rocket::fairing::AdHoc;

use crate::config::Config;
use crate::db::{DbConn, MongoStore};

pub use jwt::JwtService;
pub use ports::{Clock, SystemClock};
pub use razorpay::RazorpayService;
pub use reminder::ReminderDispatcher;
pub use renewal::RenewalProcessor;
pub use session::SessionCache;
pub use whatsapp::WhatsAppChannel;

/// Everything the routes need, built once on ignite.
pub struct AppServices {
    pub clock: Arc<dyn Clock>,
    pub renewals: RenewalProcessor<MongoStore, RazorpayService>,
    pub razorpay: Arc<RazorpayService>,
    pub reminders: Arc<ReminderDispatcher<WhatsAppChannel>>,
    pub outbox: Arc<WhatsAppChannel>,
    pub sessions: SessionCache<MongoStore>,
}

impl AppServices {
    pub fn new(store: DbConn) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let razorpay = Arc::new(RazorpayService::from_config());
        let outbox = Arc::new(WhatsAppChannel::new(Config::whatsapp_country_code()));

        AppServices {
            renewals: RenewalProcessor::new(store.clone(), razorpay.clone(), clock.clone()),
            reminders: Arc::new(ReminderDispatcher::new(
                outbox.clone(),
                Config::institute_name(),
                Config::reminder_interval(),
            )),
            sessions: SessionCache::new(
                store,
                clock.clone(),
                chrono::Duration::seconds(Config::session_ttl_secs()),
            ),
            clock,
            razorpay,
            outbox,
        }
    }
}

/// Builds [`AppServices`] on top of the store managed by `db::init`.
/// Launch is aborted when no JWT secret is configured.
pub fn init() -> AdHoc {
    AdHoc::try_on_ignite("Services", |rocket| async {
        if Config::jwt_secret().is_none() {
            error!("✗ jwt_secret is not set (ROCKET_JWT_SECRET), refusing to start");
            return Err(rocket);
        }

        let Some(store) = rocket.state::<DbConn>().cloned() else {
            error!("✗ Services not started: no database connection");
            return Ok(rocket);
        };

        if !Config::is_razorpay_enabled() {
            warn!("Razorpay keys missing, self-serve payments are disabled");
        }

        info!("✓ Subscription services ready");
        Ok(rocket.manage(AppServices::new(store)))
    })
}
