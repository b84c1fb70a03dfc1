//! Expiry reminders.
//!
//! Selection and message building are pure. Sending goes through
//! [`ReminderCommand`]s, one-way values executed against a
//! [`MessagingChannel`]; nothing waits for a delivery receipt.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;

use super::classifier;
use super::ports::{MessagingChannel, SubscriptionStore};
use crate::error::{CoreError, CoreResult};
use crate::models::{AccountFilter, AccountWithSubscription, SubscriptionStatus};

pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReminderCandidate {
    pub account_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub plan: String,
    pub status: SubscriptionStatus,
    pub days_remaining: i64,
    pub end_date: Option<DateTime<Utc>>,
}

impl ReminderCandidate {
    /// `None` unless the account is expired or expiring as of `now`.
    pub fn from_entry(entry: &AccountWithSubscription, now: DateTime<Utc>) -> Option<Self> {
        let report = classifier::classify(entry.subscription.as_ref(), now);
        if !matches!(
            report.status,
            SubscriptionStatus::Expired | SubscriptionStatus::Expiring
        ) {
            return None;
        }
        let sub = entry.subscription.as_ref()?;
        Some(ReminderCandidate {
            account_id: entry.account.id.clone(),
            name: entry.account.name.clone(),
            phone: entry.account.phone.clone(),
            plan: sub.plan.clone(),
            status: report.status,
            days_remaining: report.days_remaining,
            end_date: Some(sub.end_date),
        })
    }
}

/// Expired accounts followed by expiring ones, in the order the store
/// returns them. Status is re-derived here, not taken from the query.
pub async fn select_candidates<S>(store: &S, now: DateTime<Utc>) -> CoreResult<Vec<ReminderCandidate>>
where
    S: SubscriptionStore + ?Sized,
{
    let mut candidates = Vec::new();
    for status in [SubscriptionStatus::Expired, SubscriptionStatus::Expiring] {
        let entries = store
            .list_accounts(&AccountFilter::with_status(status), now)
            .await?;
        candidates.extend(
            entries
                .iter()
                .filter_map(|entry| ReminderCandidate::from_entry(entry, now))
                .filter(|c| c.status == status),
        );
    }
    Ok(candidates)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ReminderStats {
    pub expired: usize,
    pub expiring: usize,
    pub total: usize,
}

pub fn stats(candidates: &[ReminderCandidate]) -> ReminderStats {
    let expired = candidates
        .iter()
        .filter(|c| c.status == SubscriptionStatus::Expired)
        .count();
    let expiring = candidates
        .iter()
        .filter(|c| c.status == SubscriptionStatus::Expiring)
        .count();
    ReminderStats {
        expired,
        expiring,
        total: candidates.len(),
    }
}

pub fn expiry_phrase(status: SubscriptionStatus, days_remaining: i64) -> String {
    if status == SubscriptionStatus::Expired {
        return "has expired 😕".to_string();
    }
    match days_remaining {
        0 => "is expiring today ⏰".to_string(),
        1 => "is expiring in 1 day ⏰".to_string(),
        n => format!("is expiring in {} days ⏰", n),
    }
}

pub fn build_message(candidate: &ReminderCandidate, institute: &str) -> String {
    format!(
        "Hi {}! 👋\n\nYour {} subscription at {} {}.\n\nRenew today and keep fueling your success! 🚀",
        candidate.name,
        candidate.plan,
        institute,
        expiry_phrase(candidate.status, candidate.days_remaining)
    )
}

/// A single outbound notification, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderCommand {
    pub account_id: String,
    pub phone: String,
    pub text: String,
}

impl ReminderCommand {
    pub fn for_candidate(candidate: &ReminderCandidate, institute: &str) -> CoreResult<Self> {
        let phone = candidate
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                CoreError::validation(format!("{} has no phone number on file", candidate.name))
            })?;

        Ok(ReminderCommand {
            account_id: candidate.account_id.clone(),
            phone: phone.to_string(),
            text: build_message(candidate, institute),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
    pub attempted: usize,
    pub sent: usize,
    /// Account ids whose reminder could not be sent.
    pub failed: Vec<String>,
}

pub struct ReminderDispatcher<M> {
    channel: Arc<M>,
    institute: String,
    interval: Duration,
}

impl<M: MessagingChannel> ReminderDispatcher<M> {
    pub fn new(channel: Arc<M>, institute: impl Into<String>, interval: Duration) -> Self {
        ReminderDispatcher {
            channel,
            institute: institute.into(),
            interval,
        }
    }

    pub fn institute(&self) -> &str {
        &self.institute
    }

    /// Sends one reminder right away.
    pub async fn dispatch_one(&self, candidate: &ReminderCandidate) -> CoreResult<()> {
        let command = ReminderCommand::for_candidate(candidate, &self.institute)?;
        self.execute(&command).await
    }

    /// Validates a bulk send and turns the candidates into commands.
    ///
    /// More than one recipient needs `confirmed`. Candidates without a phone
    /// number are reported in the second list instead of failing the batch.
    pub fn plan_bulk(
        &self,
        candidates: &[ReminderCandidate],
        confirmed: bool,
    ) -> CoreResult<(Vec<ReminderCommand>, Vec<String>)> {
        if candidates.len() > 1 && !confirmed {
            return Err(CoreError::validation(format!(
                "Confirm sending {} reminders",
                candidates.len()
            )));
        }

        let mut commands = Vec::with_capacity(candidates.len());
        let mut skipped = Vec::new();
        for candidate in candidates {
            match ReminderCommand::for_candidate(candidate, &self.institute) {
                Ok(command) => commands.push(command),
                Err(e) => {
                    warn!("Skipping reminder for {}: {}", candidate.account_id, e);
                    skipped.push(candidate.account_id.clone());
                }
            }
        }
        Ok((commands, skipped))
    }

    /// Executes `commands` one after another, `interval` apart. A failed send
    /// is recorded and the batch moves on.
    pub async fn run_bulk(&self, commands: Vec<ReminderCommand>, skipped: Vec<String>) -> BulkReport {
        let mut report = BulkReport {
            attempted: commands.len() + skipped.len(),
            sent: 0,
            failed: skipped,
        };

        for (index, command) in commands.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.interval).await;
            }
            match self.execute(command).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!("Reminder to {} failed: {}", command.account_id, e);
                    report.failed.push(command.account_id.clone());
                }
            }
        }

        info!(
            "Bulk reminders finished: {} sent, {} failed",
            report.sent,
            report.failed.len()
        );
        report
    }

    async fn execute(&self, command: &ReminderCommand) -> CoreResult<()> {
        self.channel
            .open_external_thread(&command.phone, &command.text)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SubscriptionRecord, SubscriptionWrite, ValidityWindow};
    use crate::services::testing::{InMemoryStore, RecordingChannel, at, student};
    use chrono::Duration as ChronoDuration;

    const INSTITUTE: &str = "Ultimate Success Institute";

    fn candidate(id: &str, status: SubscriptionStatus, days: i64, phone: Option<&str>) -> ReminderCandidate {
        ReminderCandidate {
            account_id: id.to_string(),
            name: format!("Student {}", id),
            phone: phone.map(str::to_string),
            plan: "1 Month - Full Day - Regular Seat".to_string(),
            status,
            days_remaining: days,
            end_date: None,
        }
    }

    fn subscription(account_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> SubscriptionRecord {
        let write = SubscriptionWrite {
            plan: "3 Months - Evening - Regular Seat".to_string(),
            plan_selection: None,
            window: ValidityWindow {
                start_date: start,
                end_date: end,
            },
            amount: 1500,
            expected_revision: None,
            order_id: None,
            written_at: start,
        };
        SubscriptionRecord::next(account_id, None, &write)
    }

    fn dispatcher(channel: Arc<RecordingChannel>) -> ReminderDispatcher<RecordingChannel> {
        ReminderDispatcher::new(channel, INSTITUTE, DEFAULT_SEND_INTERVAL)
    }

    async fn send_all(
        dispatcher: &ReminderDispatcher<RecordingChannel>,
        candidates: &[ReminderCandidate],
        confirmed: bool,
    ) -> CoreResult<BulkReport> {
        let (commands, skipped) = dispatcher.plan_bulk(candidates, confirmed)?;
        Ok(dispatcher.run_bulk(commands, skipped).await)
    }

    #[test]
    fn phrases_follow_status_and_plural() {
        assert_eq!(expiry_phrase(SubscriptionStatus::Expired, 0), "has expired 😕");
        assert_eq!(expiry_phrase(SubscriptionStatus::Expiring, 0), "is expiring today ⏰");
        assert_eq!(expiry_phrase(SubscriptionStatus::Expiring, 1), "is expiring in 1 day ⏰");
        assert_eq!(expiry_phrase(SubscriptionStatus::Expiring, 5), "is expiring in 5 days ⏰");
    }

    #[test]
    fn message_interpolates_name_plan_and_phrase() {
        let c = candidate("7", SubscriptionStatus::Expiring, 3, Some("9000000007"));
        assert_eq!(
            build_message(&c, INSTITUTE),
            "Hi Student 7! 👋\n\nYour 1 Month - Full Day - Regular Seat subscription at \
             Ultimate Success Institute is expiring in 3 days ⏰.\n\n\
             Renew today and keep fueling your success! 🚀"
        );
    }

    #[tokio::test]
    async fn selects_expired_then_expiring_only() {
        let now = at(2025, 6, 15);
        let store = InMemoryStore::new();
        for (id, phone) in [("a", "9000000001"), ("b", "9000000002"), ("c", "9000000003"), ("d", "9000000004")] {
            store.add_account(student(id, id, Some(phone)));
        }
        // a: expiring in 3 days, b: active, c: expired, d: no subscription
        store.put_subscription(subscription("a", at(2025, 5, 18), now + ChronoDuration::days(3)));
        store.put_subscription(subscription("b", at(2025, 6, 1), at(2025, 9, 1)));
        store.put_subscription(subscription("c", at(2025, 3, 1), at(2025, 6, 1)));

        let candidates = select_candidates(&store, now).await.unwrap();
        let ids: Vec<&str> = candidates.iter().map(|c| c.account_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(candidates[0].status, SubscriptionStatus::Expired);
        assert_eq!(candidates[1].days_remaining, 3);

        let s = stats(&candidates);
        assert_eq!((s.expired, s.expiring, s.total), (1, 1, 2));
    }

    #[tokio::test]
    async fn empty_account_set_sends_nothing() {
        let store = InMemoryStore::new();
        let candidates = select_candidates(&store, at(2025, 6, 15)).await.unwrap();
        assert!(candidates.is_empty());

        let channel = Arc::new(RecordingChannel::new());
        let report = send_all(&dispatcher(channel.clone()), &candidates, false)
            .await
            .unwrap();
        assert_eq!(report, BulkReport::default());
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn bulk_needs_confirmation_for_several_recipients() {
        let channel = Arc::new(RecordingChannel::new());
        let batch = vec![
            candidate("1", SubscriptionStatus::Expired, 0, Some("9000000001")),
            candidate("2", SubscriptionStatus::Expiring, 2, Some("9000000002")),
        ];
        let err = send_all(&dispatcher(channel.clone()), &batch, false)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn single_recipient_needs_no_confirmation() {
        let channel = Arc::new(RecordingChannel::new());
        let batch = vec![candidate("1", SubscriptionStatus::Expired, 0, Some("9000000001"))];
        let report = send_all(&dispatcher(channel.clone()), &batch, false)
            .await
            .unwrap();
        assert_eq!(report.sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_sends_are_spaced_and_failures_do_not_stop_the_batch() {
        let channel = Arc::new(RecordingChannel::new());
        channel.fail_for("9000000002");
        let batch = vec![
            candidate("1", SubscriptionStatus::Expired, 0, Some("9000000001")),
            candidate("2", SubscriptionStatus::Expired, 0, Some("9000000002")),
            candidate("3", SubscriptionStatus::Expiring, 1, None),
            candidate("4", SubscriptionStatus::Expiring, 6, Some("9000000004")),
        ];

        let report = send_all(&dispatcher(channel.clone()), &batch, true)
            .await
            .unwrap();

        assert_eq!(report.attempted, 4);
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, vec!["3".to_string(), "2".to_string()]);

        let sent = channel.sent();
        assert_eq!(sent[0].0, "9000000001");
        assert_eq!(sent[1].0, "9000000004");

        // Three commands ran; the failed one in the middle still waited its turn.
        let times = channel.send_times();
        let gap = times[1] - times[0];
        assert!(gap >= 2 * DEFAULT_SEND_INTERVAL);
        assert!(gap < 2 * DEFAULT_SEND_INTERVAL + Duration::from_millis(50));
    }

    #[tokio::test]
    async fn dispatch_one_requires_a_phone() {
        let channel = Arc::new(RecordingChannel::new());
        let d = dispatcher(channel.clone());

        let err = d
            .dispatch_one(&candidate("1", SubscriptionStatus::Expired, 0, None))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        d.dispatch_one(&candidate("2", SubscriptionStatus::Expiring, 1, Some(" 9000000002 ")))
            .await
            .unwrap();
        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "9000000002");
        assert!(sent[0].1.contains("is expiring in 1 day ⏰"));
    }
}
