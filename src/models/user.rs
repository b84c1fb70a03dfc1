use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{StatusReport, SubscriptionRecord, SubscriptionStatus};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Student,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Who is making the request, as reported by the identity collaborator.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&Account> for Identity {
    fn from(account: &Account) -> Self {
        Identity {
            id: account.id.clone(),
            name: account.name.clone(),
            email: account.email.clone(),
            role: account.role,
        }
    }
}

/// An account together with its current subscription, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountWithSubscription {
    pub account: Account,
    pub subscription: Option<SubscriptionRecord>,
}

/// Query handed to the persistence collaborator.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub status: Option<SubscriptionStatus>,
    /// Matched against name, email and phone.
    pub search: Option<String>,
}

impl AccountFilter {
    pub fn with_status(status: SubscriptionStatus) -> Self {
        AccountFilter {
            status: Some(status),
            search: None,
        }
    }
}

/// Row of the admin user table.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub plan: Option<String>,
    pub status: SubscriptionStatus,
    pub days_remaining: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub current_plan_amount: i64,
    pub total_paid: i64,
}

impl AdminUserView {
    pub fn new(entry: &AccountWithSubscription, report: StatusReport) -> Self {
        let sub = entry.subscription.as_ref();
        AdminUserView {
            id: entry.account.id.clone(),
            name: entry.account.name.clone(),
            email: entry.account.email.clone(),
            phone: entry.account.phone.clone(),
            plan: sub.map(|s| s.plan.clone()),
            status: report.status,
            days_remaining: report.days_remaining,
            start_date: sub.map(|s| s.start_date),
            end_date: sub.map(|s| s.end_date),
            current_plan_amount: sub.map(|s| s.current_plan_amount).unwrap_or(0),
            total_paid: sub.map(|s| s.amount_paid).unwrap_or(0),
        }
    }
}
