//! MongoDB implementation of the persistence and identity collaborators.
//!
//! Documents keep BSON datetimes; conversion to `chrono` happens here and
//! nowhere else.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use log::{info, warn};
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};

use super::{PAYMENTS, SUBSCRIPTIONS, USERS};
use crate::error::{CoreError, CoreResult};
use crate::models::{
    Account, AccountFilter, AccountWithSubscription, Identity, Payment, PaymentStatus,
    PlanSelection, Role, SubscriptionPeriod, SubscriptionRecord, SubscriptionWrite,
};
use crate::services::classifier;
use crate::services::ports::{IdentityProvider, SubscriptionStore};

const STALE_SUBSCRIPTION: &str = "Subscription was modified by another request, reload and retry";

fn to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

fn from_bson(dt: BsonDateTime) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(dt.timestamp_millis())
        .single()
        .unwrap_or_default()
}

fn default_role() -> Role {
    Role::Student
}

#[derive(Debug, Serialize, Deserialize)]
struct UserDoc {
    #[serde(rename = "_id")]
    id: ObjectId,
    name: String,
    email: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default = "default_role")]
    role: Role,
    created_at: BsonDateTime,
}

impl From<UserDoc> for Account {
    fn from(doc: UserDoc) -> Self {
        Account {
            id: doc.id.to_hex(),
            name: doc.name,
            email: doc.email,
            phone: doc.phone,
            role: doc.role,
            created_at: from_bson(doc.created_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PeriodDoc {
    plan: String,
    start_date: BsonDateTime,
    end_date: BsonDateTime,
    amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SubscriptionDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    user_id: String,
    plan: String,
    #[serde(default)]
    plan_selection: Option<PlanSelection>,
    start_date: BsonDateTime,
    end_date: BsonDateTime,
    amount_paid: i64,
    current_plan_amount: i64,
    #[serde(default)]
    revision: i64,
    #[serde(default)]
    last_order_id: Option<String>,
    #[serde(default)]
    history: Vec<PeriodDoc>,
    created_at: BsonDateTime,
    updated_at: BsonDateTime,
}

impl From<SubscriptionDoc> for SubscriptionRecord {
    fn from(doc: SubscriptionDoc) -> Self {
        SubscriptionRecord {
            account_id: doc.user_id,
            plan: doc.plan,
            plan_selection: doc.plan_selection,
            start_date: from_bson(doc.start_date),
            end_date: from_bson(doc.end_date),
            amount_paid: doc.amount_paid,
            current_plan_amount: doc.current_plan_amount,
            revision: doc.revision,
            last_order_id: doc.last_order_id,
            history: doc
                .history
                .into_iter()
                .map(|p| SubscriptionPeriod {
                    plan: p.plan,
                    start_date: from_bson(p.start_date),
                    end_date: from_bson(p.end_date),
                    amount: p.amount,
                })
                .collect(),
            created_at: from_bson(doc.created_at),
            updated_at: from_bson(doc.updated_at),
        }
    }
}

impl From<&SubscriptionRecord> for SubscriptionDoc {
    fn from(record: &SubscriptionRecord) -> Self {
        SubscriptionDoc {
            id: None,
            user_id: record.account_id.clone(),
            plan: record.plan.clone(),
            plan_selection: record.plan_selection,
            start_date: to_bson(record.start_date),
            end_date: to_bson(record.end_date),
            amount_paid: record.amount_paid,
            current_plan_amount: record.current_plan_amount,
            revision: record.revision,
            last_order_id: record.last_order_id.clone(),
            history: record
                .history
                .iter()
                .map(|p| PeriodDoc {
                    plan: p.plan.clone(),
                    start_date: to_bson(p.start_date),
                    end_date: to_bson(p.end_date),
                    amount: p.amount,
                })
                .collect(),
            created_at: to_bson(record.created_at),
            updated_at: to_bson(record.updated_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PaymentDoc {
    order_id: String,
    user_id: String,
    plan_selection: PlanSelection,
    amount: i64,
    status: PaymentStatus,
    #[serde(default)]
    payment_id: Option<String>,
    created_at: BsonDateTime,
    updated_at: BsonDateTime,
}

impl From<PaymentDoc> for Payment {
    fn from(doc: PaymentDoc) -> Self {
        Payment {
            order_id: doc.order_id,
            account_id: doc.user_id,
            plan_selection: doc.plan_selection,
            amount: doc.amount,
            status: doc.status,
            payment_id: doc.payment_id,
            created_at: from_bson(doc.created_at),
            updated_at: from_bson(doc.updated_at),
        }
    }
}

impl From<&Payment> for PaymentDoc {
    fn from(payment: &Payment) -> Self {
        PaymentDoc {
            order_id: payment.order_id.clone(),
            user_id: payment.account_id.clone(),
            plan_selection: payment.plan_selection,
            amount: payment.amount,
            status: payment.status,
            payment_id: payment.payment_id.clone(),
            created_at: to_bson(payment.created_at),
            updated_at: to_bson(payment.updated_at),
        }
    }
}

/// Case-insensitive substring match on name, email or phone.
fn search_filter(search: Option<&str>) -> Document {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(term) => {
            let pattern = regex::escape(term);
            doc! {
                "$or": [
                    { "name": { "$regex": &pattern, "$options": "i" } },
                    { "email": { "$regex": &pattern, "$options": "i" } },
                    { "phone": { "$regex": &pattern, "$options": "i" } },
                ]
            }
        }
        None => doc! {},
    }
}

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        MongoStore { db }
    }

    fn users(&self) -> Collection<UserDoc> {
        self.db.collection(USERS)
    }

    fn subscriptions(&self) -> Collection<SubscriptionDoc> {
        self.db.collection(SUBSCRIPTIONS)
    }

    fn payments(&self) -> Collection<PaymentDoc> {
        self.db.collection(PAYMENTS)
    }

    async fn subscriptions_for(&self, user_ids: &[String]) -> CoreResult<HashMap<String, SubscriptionRecord>> {
        let mut cursor = self
            .subscriptions()
            .find(doc! { "user_id": { "$in": user_ids.to_vec() } }, None)
            .await?;

        let mut found = HashMap::new();
        while cursor.advance().await? {
            let record = SubscriptionRecord::from(cursor.deserialize_current()?);
            found.insert(record.account_id.clone(), record);
        }
        Ok(found)
    }
}

#[rocket::async_trait]
impl SubscriptionStore for MongoStore {
    async fn get_account(&self, account_id: &str) -> CoreResult<Option<Account>> {
        let Ok(id) = ObjectId::parse_str(account_id) else {
            return Ok(None);
        };
        let user = self.users().find_one(doc! { "_id": id }, None).await?;
        Ok(user.map(Account::from))
    }

    async fn get_subscription(&self, account_id: &str) -> CoreResult<Option<SubscriptionRecord>> {
        let sub = self
            .subscriptions()
            .find_one(doc! { "user_id": account_id }, None)
            .await?;
        Ok(sub.map(SubscriptionRecord::from))
    }

    async fn list_accounts(
        &self,
        filter: &AccountFilter,
        as_of: DateTime<Utc>,
    ) -> CoreResult<Vec<AccountWithSubscription>> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let mut cursor = self
            .users()
            .find(search_filter(filter.search.as_deref()), options)
            .await?;

        let mut accounts = Vec::new();
        while cursor.advance().await? {
            accounts.push(Account::from(cursor.deserialize_current()?));
        }

        let ids: Vec<String> = accounts.iter().map(|a| a.id.clone()).collect();
        let mut subscriptions = self.subscriptions_for(&ids).await?;

        Ok(accounts
            .into_iter()
            .map(|account| {
                let subscription = subscriptions.remove(&account.id);
                AccountWithSubscription {
                    account,
                    subscription,
                }
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
        let previous = self.get_subscription(account_id).await?;

        if previous.as_ref().map(|p| p.revision) != write.expected_revision {
            return Err(CoreError::conflict(STALE_SUBSCRIPTION));
        }

        let record = SubscriptionRecord::next(account_id, previous.as_ref(), write);
        let document = SubscriptionDoc::from(&record);

        match write.expected_revision {
            // Racing first writes are settled by the unique index on user_id.
            None => {
                self.subscriptions()
                    .insert_one(&document, None)
                    .await
                    .map_err(|e| CoreError::from_mongo(e, STALE_SUBSCRIPTION))?;
            }
            Some(revision) => {
                let result = self
                    .subscriptions()
                    .replace_one(
                        doc! { "user_id": account_id, "revision": revision },
                        &document,
                        None,
                    )
                    .await?;

                if result.matched_count == 0 {
                    warn!("Stale subscription write for {} at revision {}", account_id, revision);
                    return Err(CoreError::conflict(STALE_SUBSCRIPTION));
                }
            }
        }

        Ok(record)
    }

    async fn delete_account(&self, account_id: &str) -> CoreResult<()> {
        let id = ObjectId::parse_str(account_id)
            .map_err(|_| CoreError::validation("Invalid user ID"))?;

        // The user document goes last so a retry after a partial failure
        // still finds the account.
        self.payments()
            .delete_many(doc! { "user_id": account_id }, None)
            .await?;
        self.subscriptions()
            .delete_many(doc! { "user_id": account_id }, None)
            .await?;
        self.users().delete_one(doc! { "_id": id }, None).await?;

        info!("Deleted account {} with its subscription and payments", account_id);
        Ok(())
    }

    async fn record_payment(&self, payment: &Payment) -> CoreResult<()> {
        self.payments()
            .insert_one(PaymentDoc::from(payment), None)
            .await
            .map_err(|e| CoreError::from_mongo(e, "Payment order already recorded"))?;
        Ok(())
    }

    async fn find_payment(&self, order_id: &str) -> CoreResult<Option<Payment>> {
        let payment = self
            .payments()
            .find_one(doc! { "order_id": order_id }, None)
            .await?;
        Ok(payment.map(Payment::from))
    }

    async fn update_payment_status(
        &self,
        order_id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
        payment_id: Option<&str>,
    ) -> CoreResult<bool> {
        let mut set = doc! {
            "status": to.as_str(),
            "updated_at": BsonDateTime::now(),
        };
        if let Some(id) = payment_id {
            set.insert("payment_id", id);
        }

        let result = self
            .payments()
            .update_one(
                doc! { "order_id": order_id, "status": from.as_str() },
                doc! { "$set": set },
                None,
            )
            .await?;

        Ok(result.modified_count == 1)
    }
}

#[rocket::async_trait]
impl IdentityProvider for MongoStore {
    async fn current_user(&self, account_id: &str) -> CoreResult<Option<Identity>> {
        let account = self.get_account(account_id).await?;
        Ok(account.as_ref().map(Identity::from))
    }
}
