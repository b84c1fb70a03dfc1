//! Derives subscription status from dates alone.

use chrono::{DateTime, Utc};

use crate::models::{Role, StatusReport, SubscriptionRecord, SubscriptionStatus};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Subscriptions with this many days or fewer left are `Expiring`.
pub const EXPIRING_WINDOW_DAYS: i64 = 7;

/// Period length assumed when a window is unknown or empty.
const DEFAULT_TOTAL_DAYS: i64 = 30;

/// Whole days from `now` until `end`, rounded up, never negative.
pub fn days_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let remaining_ms = (end - now).num_milliseconds();
    if remaining_ms <= 0 {
        return 0;
    }
    (remaining_ms + DAY_MS - 1) / DAY_MS
}

/// Classifies a subscription as of `now`.
///
/// A missing record and a record whose end precedes its start both map to
/// `Inactive` with zero days. A subscription ending exactly at `now` is
/// already `Expired`.
pub fn classify(subscription: Option<&SubscriptionRecord>, now: DateTime<Utc>) -> StatusReport {
    let Some(sub) = subscription else {
        return StatusReport::INACTIVE;
    };

    if sub.end_date < sub.start_date {
        return StatusReport::INACTIVE;
    }

    if sub.end_date <= now {
        return StatusReport {
            status: SubscriptionStatus::Expired,
            days_remaining: 0,
        };
    }

    let days = days_remaining(sub.end_date, now);
    let status = if days <= EXPIRING_WINDOW_DAYS {
        SubscriptionStatus::Expiring
    } else {
        SubscriptionStatus::Active
    };

    StatusReport {
        status,
        days_remaining: days,
    }
}

/// Length of the period in whole days, for progress display.
pub fn total_days(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> i64 {
    match (start, end) {
        (Some(start), Some(end)) if end > start => {
            let ms = (end - start).num_milliseconds();
            (ms + DAY_MS - 1) / DAY_MS
        }
        _ => DEFAULT_TOTAL_DAYS,
    }
}

/// Students get a renewal prompt on the dashboard once their plan is expiring.
pub fn should_prompt_renewal(role: Role, report: StatusReport) -> bool {
    role == Role::Student && report.status == SubscriptionStatus::Expiring
}
