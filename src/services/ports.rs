//! Seams between the subscription core and the systems it depends on.
//!
//! The core never talks to MongoDB, Razorpay or WhatsApp directly; it goes
//! through these traits so the rules stay testable with in-memory fakes.

use chrono::{DateTime, Utc};

use crate::error::CoreResult;
use crate::models::{
    Account, AccountFilter, AccountWithSubscription, Identity, OrderDescriptor, OrderRequest,
    Payment, PaymentStatus, SubscriptionRecord, SubscriptionWrite,
};

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Persistence collaborator. Owns the database and is the single source of
/// truth for subscription windows.
#[rocket::async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get_account(&self, account_id: &str) -> CoreResult<Option<Account>>;

    async fn get_subscription(&self, account_id: &str) -> CoreResult<Option<SubscriptionRecord>>;

    /// Accounts matching `filter`. When a status is given, the store evaluates
    /// it from the dates as of `as_of`, never from a cached label.
    async fn list_accounts(
        &self,
        filter: &AccountFilter,
        as_of: DateTime<Utc>,
    ) -> CoreResult<Vec<AccountWithSubscription>>;

    /// Commits a renewal atomically. Fails with `Conflict` when the stored
    /// revision no longer matches `write.expected_revision`.
    async fn write_subscription(
        &self,
        account_id: &str,
        write: &SubscriptionWrite,
    ) -> CoreResult<SubscriptionRecord>;

    /// Removes the account with its subscription and payments. Payments and
    /// the subscription go first and the account last, so a call that fails
    /// partway can be repeated.
    async fn delete_account(&self, account_id: &str) -> CoreResult<()>;

    async fn record_payment(&self, payment: &Payment) -> CoreResult<()>;

    async fn find_payment(&self, order_id: &str) -> CoreResult<Option<Payment>>;

    /// Moves a payment out of `from` into `to`. Returns `false` when the
    /// payment was not in `from` anymore.
    async fn update_payment_status(
        &self,
        order_id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
        payment_id: Option<&str>,
    ) -> CoreResult<bool>;
}

/// Payment collaborator. Creates orders; verification of the settlement is
/// its own business.
#[rocket::async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: &OrderRequest) -> CoreResult<OrderDescriptor>;
}

/// Outbound messaging collaborator. Best effort, no delivery receipt.
#[rocket::async_trait]
pub trait MessagingChannel: Send + Sync {
    async fn open_external_thread(&self, phone: &str, text: &str) -> CoreResult<()>;
}

/// Identity collaborator behind `/auth/me`.
#[rocket::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self, account_id: &str) -> CoreResult<Option<Identity>>;
}
