use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::PlanSelection;

/// Derived subscription state. Never persisted; always recomputed from the
/// validity window and the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expiring,
    Expired,
    Inactive,
}

impl SubscriptionStatus {
    /// Parses the admin filter value; `all` (or nothing) means no filter.
    pub fn parse_filter(value: Option<&str>) -> Result<Option<Self>, crate::error::CoreError> {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("all") => Ok(None),
            Some("active") => Ok(Some(SubscriptionStatus::Active)),
            Some("expiring") => Ok(Some(SubscriptionStatus::Expiring)),
            Some("expired") => Ok(Some(SubscriptionStatus::Expired)),
            Some("inactive") => Ok(Some(SubscriptionStatus::Inactive)),
            Some(other) => Err(crate::error::CoreError::validation(format!(
                "Invalid status filter '{}'",
                other
            ))),
        }
    }
}

/// Output of the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: SubscriptionStatus,
    pub days_remaining: i64,
}

impl StatusReport {
    pub const INACTIVE: StatusReport = StatusReport {
        status: SubscriptionStatus::Inactive,
        days_remaining: 0,
    };
}

/// A start/end pair. `end` is never before `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidityWindow {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// A period that was superseded by a later renewal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPeriod {
    pub plan: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub amount: i64,
}

/// The account's current subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub account_id: String,
    pub plan: String,
    pub plan_selection: Option<PlanSelection>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Cumulative across renewals.
    pub amount_paid: i64,
    pub current_plan_amount: i64,
    pub revision: i64,
    /// Gateway order whose payment produced the latest renewal.
    pub last_order_id: Option<String>,
    #[serde(default)]
    pub history: Vec<SubscriptionPeriod>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    pub fn as_period(&self) -> SubscriptionPeriod {
        SubscriptionPeriod {
            plan: self.plan.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            amount: self.current_plan_amount,
        }
    }

    /// The record that results from applying `write` on top of `previous`.
    /// The previous period moves into the history and the amount accumulates.
    pub fn next(
        account_id: &str,
        previous: Option<&SubscriptionRecord>,
        write: &SubscriptionWrite,
    ) -> SubscriptionRecord {
        let (amount_paid, revision, history, created_at) = match previous {
            Some(prev) => {
                let mut history = prev.history.clone();
                history.push(prev.as_period());
                (
                    prev.amount_paid + write.amount,
                    prev.revision + 1,
                    history,
                    prev.created_at,
                )
            }
            None => (write.amount, 1, Vec::new(), write.written_at),
        };

        SubscriptionRecord {
            account_id: account_id.to_string(),
            plan: write.plan.clone(),
            plan_selection: write.plan_selection,
            start_date: write.window.start_date,
            end_date: write.window.end_date,
            amount_paid,
            current_plan_amount: write.amount,
            revision,
            last_order_id: write.order_id.clone(),
            history,
            created_at,
            updated_at: write.written_at,
        }
    }
}

/// Everything the store needs to commit one renewal as a single update.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionWrite {
    pub plan: String,
    pub plan_selection: Option<PlanSelection>,
    pub window: ValidityWindow,
    pub amount: i64,
    /// Revision the caller read; `None` when no record existed.
    pub expected_revision: Option<i64>,
    /// Set when the renewal was paid for.
    pub order_id: Option<String>,
    pub written_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn write(amount: i64, at: DateTime<Utc>) -> SubscriptionWrite {
        SubscriptionWrite {
            plan: "1 Month - Morning - Regular Seat".to_string(),
            plan_selection: None,
            window: ValidityWindow {
                start_date: at,
                end_date: at + Duration::days(31),
            },
            amount,
            expected_revision: None,
            order_id: None,
            written_at: at,
        }
    }

    #[test]
    fn next_record_accumulates_and_keeps_history() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let first = SubscriptionRecord::next("acc", None, &write(650, t0));
        assert_eq!(first.revision, 1);
        assert_eq!(first.amount_paid, 650);
        assert!(first.history.is_empty());

        let t1 = t0 + Duration::days(40);
        let second = SubscriptionRecord::next("acc", Some(&first), &write(800, t1));
        assert_eq!(second.revision, 2);
        assert_eq!(second.amount_paid, 1450);
        assert_eq!(second.current_plan_amount, 800);
        assert_eq!(second.history, vec![first.as_period()]);
        assert_eq!(second.created_at, t0);
        assert_eq!(second.updated_at, t1);
    }

    #[test]
    fn status_filter_accepts_all_and_known_values() {
        assert_eq!(SubscriptionStatus::parse_filter(None).unwrap(), None);
        assert_eq!(SubscriptionStatus::parse_filter(Some("all")).unwrap(), None);
        assert_eq!(
            SubscriptionStatus::parse_filter(Some("Expiring")).unwrap(),
            Some(SubscriptionStatus::Expiring)
        );
        assert!(SubscriptionStatus::parse_filter(Some("paused")).is_err());
    }
}
