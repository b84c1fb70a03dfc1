//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};

use super::classifier;
use super::ports::{Clock, IdentityProvider, MessagingChannel, PaymentGateway, SubscriptionStore};
use crate::error::{CoreError, CoreResult};
use crate::models::{
    Account, AccountFilter, AccountWithSubscription, Identity, OrderDescriptor, OrderRequest,
    Payment, PaymentStatus, Role, SubscriptionRecord, SubscriptionWrite,
};

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

pub fn student(id: &str, name: &str, phone: Option<&str>) -> Account {
    Account {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{}@example.com", id),
        phone: phone.map(str::to_string),
        role: Role::Student,
        created_at: at(2024, 1, 1),
    }
}

pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        FixedClock(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
struct StoreInner {
    accounts: Vec<Account>,
    subscriptions: HashMap<String, SubscriptionRecord>,
    payments: HashMap<String, Payment>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<StoreInner>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
    delete_steps_left: Mutex<Option<usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, account: Account) {
        self.inner.lock().unwrap().accounts.push(account);
    }

    pub fn put_subscription(&self, record: SubscriptionRecord) {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .insert(record.account_id.clone(), record);
    }

    pub fn subscription(&self, account_id: &str) -> Option<SubscriptionRecord> {
        self.inner.lock().unwrap().subscriptions.get(account_id).cloned()
    }

    pub fn put_payment(&self, payment: Payment) {
        self.inner
            .lock()
            .unwrap()
            .payments
            .insert(payment.order_id.clone(), payment);
    }

    pub fn payment(&self, order_id: &str) -> Option<Payment> {
        self.inner.lock().unwrap().payments.get(order_id).cloned()
    }

    /// Makes every call fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Lets the next account deletion complete `steps` of its three steps
    /// before failing as if the database went away.
    pub fn fail_deletion_after(&self, steps: usize) {
        *self.delete_steps_left.lock().unwrap() = Some(steps);
    }

    fn delete_step(&self) -> CoreResult<()> {
        let mut left = self.delete_steps_left.lock().unwrap();
        match left.as_mut() {
            Some(0) => {
                *left = None;
                Err(CoreError::transient("Database error: connection reset"))
            }
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> CoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoreError::transient_from(
                "Database error: connection refused",
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
            ));
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn get_account(&self, account_id: &str) -> CoreResult<Option<Account>> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.accounts.iter().find(|a| a.id == account_id).cloned())
    }

    async fn get_subscription(&self, account_id: &str) -> CoreResult<Option<SubscriptionRecord>> {
        self.check()?;
        Ok(self.subscription(account_id))
    }

    async fn list_accounts(
        &self,
        filter: &AccountFilter,
        as_of: DateTime<Utc>,
    ) -> CoreResult<Vec<AccountWithSubscription>> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        let needle = filter.search.as_deref().map(str::to_lowercase);

        Ok(inner
            .accounts
            .iter()
            .filter(|a| match &needle {
                Some(n) => {
                    a.name.to_lowercase().contains(n)
                        || a.email.to_lowercase().contains(n)
                        || a.phone.as_deref().is_some_and(|p| p.contains(n.as_str()))
                }
                None => true,
            })
            .map(|a| AccountWithSubscription {
                account: a.clone(),
                subscription: inner.subscriptions.get(&a.id).cloned(),
            })
            .filter(|entry| match filter.status {
                Some(status) => {
                    classifier::classify(entry.subscription.as_ref(), as_of).status == status
                }
                None => true,
            })
            .collect())
    }

    async fn write_subscription(
        &self,
        account_id: &str,
        write: &SubscriptionWrite,
    ) -> CoreResult<SubscriptionRecord> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        let previous = inner.subscriptions.get(account_id);

        if previous.map(|p| p.revision) != write.expected_revision {
            return Err(CoreError::conflict(
                "Subscription was modified by another request, reload and retry",
            ));
        }

        let record = SubscriptionRecord::next(account_id, previous, write);
        inner
            .subscriptions
            .insert(account_id.to_string(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn delete_account(&self, account_id: &str) -> CoreResult<()> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        self.delete_step()?;
        inner.payments.retain(|_, p| p.account_id != account_id);
        self.delete_step()?;
        inner.subscriptions.remove(account_id);
        self.delete_step()?;
        inner.accounts.retain(|a| a.id != account_id);
        Ok(())
    }

    async fn record_payment(&self, payment: &Payment) -> CoreResult<()> {
        self.check()?;
        self.inner
            .lock()
            .unwrap()
            .payments
            .insert(payment.order_id.clone(), payment.clone());
        Ok(())
    }

    async fn find_payment(&self, order_id: &str) -> CoreResult<Option<Payment>> {
        self.check()?;
        Ok(self.payment(order_id))
    }

    async fn update_payment_status(
        &self,
        order_id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
        payment_id: Option<&str>,
    ) -> CoreResult<bool> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        match inner.payments.get_mut(order_id) {
            Some(p) if p.status == from => {
                p.status = to;
                if let Some(id) = payment_id {
                    p.payment_id = Some(id.to_string());
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct FakeGateway {
    requests: Mutex<Vec<OrderRequest>>,
    failing: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<OrderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[rocket::async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, request: &OrderRequest) -> CoreResult<OrderDescriptor> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::transient("Payment gateway timed out"));
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(OrderDescriptor {
            order_id: format!("order_{}", requests.len()),
            amount: request.amount,
            currency: "INR".to_string(),
            key_id: Some("rzp_test_key".to_string()),
        })
    }
}

/// Records every thread it is asked to open, together with the tokio time.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(String, String, tokio::time::Instant)>>,
    failing_phones: Mutex<HashSet<String>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, phone: &str) {
        self.failing_phones.lock().unwrap().insert(phone.to_string());
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(p, t, _)| (p.clone(), t.clone()))
            .collect()
    }

    pub fn send_times(&self) -> Vec<tokio::time::Instant> {
        self.sent.lock().unwrap().iter().map(|(_, _, at)| *at).collect()
    }
}

#[rocket::async_trait]
impl MessagingChannel for RecordingChannel {
    async fn open_external_thread(&self, phone: &str, text: &str) -> CoreResult<()> {
        if self.failing_phones.lock().unwrap().contains(phone) {
            return Err(CoreError::transient("Messaging channel unavailable"));
        }
        self.sent.lock().unwrap().push((
            phone.to_string(),
            text.to_string(),
            tokio::time::Instant::now(),
        ));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeIdentity {
    users: Mutex<HashMap<String, Identity>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, identity: Identity) {
        self.users
            .lock()
            .unwrap()
            .insert(identity.id.clone(), identity);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[rocket::async_trait]
impl IdentityProvider for FakeIdentity {
    async fn current_user(&self, account_id: &str) -> CoreResult<Option<Identity>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::transient("Identity service unreachable"));
        }
        Ok(self.users.lock().unwrap().get(account_id).cloned())
    }
}
