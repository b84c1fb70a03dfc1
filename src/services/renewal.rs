//! Renewal workflows: quoting, admin grants and paid renewals.
//!
//! All three share one window computation. Every input is validated before
//! any collaborator is called, and each renewal reaches the store as a single
//! `write_subscription` call so callers never observe half a renewal.

use std::sync::Arc;

use chrono::{DateTime, Months, NaiveDate, NaiveTime, Utc};
use log::{info, warn};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;

use super::classifier;
use super::ports::{Clock, PaymentGateway, SubscriptionStore};
use super::pricing;
use crate::error::{CoreError, CoreResult};
use crate::models::{
    OrderMetadata, OrderRequest, Payment, PaymentConfirmation, PaymentIntent, PaymentStatus,
    PlanSelection, SubscriptionRecord, SubscriptionStatus, SubscriptionWrite, ValidityWindow,
};

pub const MIN_MANUAL_MONTHS: i64 = 1;
pub const MAX_MANUAL_MONTHS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub amount: i64,
}

/// Administrator grant. `start_date` may lie in the past.
#[derive(Debug, Clone)]
pub struct ManualRenewal {
    pub account_id: String,
    pub plan: PlanSelection,
    pub start_date: NaiveDate,
    pub months: i64,
    /// The admin acknowledged that the current period is replaced.
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    /// The payment extended or opened the subscription just now.
    Applied(SubscriptionRecord),
    /// The order had been applied before; nothing changed.
    AlreadyApplied(Option<SubscriptionRecord>),
    /// The gateway reported a failed payment; nothing was committed.
    Failed,
}

/// Adds calendar months, clamping to the last day of the target month
/// (Jan 31 + 1 month = Feb 28/29).
pub fn add_months(start: DateTime<Utc>, months: u32) -> CoreResult<DateTime<Utc>> {
    start
        .checked_add_months(Months::new(months))
        .ok_or_else(|| CoreError::validation("Subscription end date is out of range"))
}

/// Midnight UTC of the given calendar day.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Price and window for `plan`, starting at `start` or `now`.
///
/// Self-serve quotes may not start on a day before today.
pub fn quote_renewal(
    plan: &PlanSelection,
    start: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> CoreResult<Quote> {
    let start_date = start.unwrap_or(now);
    if start_date.date_naive() < now.date_naive() {
        return Err(CoreError::validation("Start date cannot be in the past"));
    }

    Ok(Quote {
        start_date,
        end_date: add_months(start_date, plan.duration.months())?,
        amount: pricing::total(plan),
    })
}

/// Window for a paid renewal: a subscription that is still running is
/// extended from its current end date; otherwise a new period opens at `now`.
pub fn paid_renewal_window(
    current: Option<&SubscriptionRecord>,
    plan: &PlanSelection,
    now: DateTime<Utc>,
) -> CoreResult<ValidityWindow> {
    let months = plan.duration.months();
    match current {
        Some(sub) if is_running(sub, now) => Ok(ValidityWindow {
            start_date: sub.start_date,
            end_date: add_months(sub.end_date, months)?,
        }),
        _ => Ok(ValidityWindow {
            start_date: now,
            end_date: add_months(now, months)?,
        }),
    }
}

fn is_running(sub: &SubscriptionRecord, now: DateTime<Utc>) -> bool {
    matches!(
        classifier::classify(Some(sub), now).status,
        SubscriptionStatus::Active | SubscriptionStatus::Expiring
    )
}

pub fn validate_manual_months(months: i64) -> CoreResult<u32> {
    if !(MIN_MANUAL_MONTHS..=MAX_MANUAL_MONTHS).contains(&months) {
        return Err(CoreError::validation(format!(
            "Months must be between {} and {}",
            MIN_MANUAL_MONTHS, MAX_MANUAL_MONTHS
        )));
    }
    Ok(months as u32)
}

pub struct RenewalProcessor<S, P> {
    store: Arc<S>,
    gateway: Arc<P>,
    clock: Arc<dyn Clock>,
}

impl<S: SubscriptionStore, P: PaymentGateway> RenewalProcessor<S, P> {
    pub fn new(store: Arc<S>, gateway: Arc<P>, clock: Arc<dyn Clock>) -> Self {
        RenewalProcessor {
            store,
            gateway,
            clock,
        }
    }

    pub fn quote(&self, plan: &PlanSelection, start: Option<DateTime<Utc>>) -> CoreResult<Quote> {
        quote_renewal(plan, start, self.clock.now())
    }

    /// Grants a subscription without payment. Replaces the current period
    /// with `[start_date, start_date + months]`.
    pub async fn apply_manual_renewal(
        &self,
        renewal: &ManualRenewal,
    ) -> CoreResult<SubscriptionRecord> {
        if !renewal.confirmed {
            return Err(CoreError::validation(
                "Updating a subscription requires confirm=true",
            ));
        }
        let months = validate_manual_months(renewal.months)?;
        let start_date = start_of_day(renewal.start_date);
        let window = ValidityWindow {
            start_date,
            end_date: add_months(start_date, months)?,
        };

        self.require_account(&renewal.account_id).await?;
        let current = self.store.get_subscription(&renewal.account_id).await?;

        let write = SubscriptionWrite {
            plan: renewal.plan.label(),
            plan_selection: Some(renewal.plan),
            window,
            amount: pricing::total(&renewal.plan),
            expected_revision: current.as_ref().map(|s| s.revision),
            order_id: None,
            written_at: self.clock.now(),
        };

        let record = self
            .store
            .write_subscription(&renewal.account_id, &write)
            .await?;

        info!(
            "Manual renewal for {}: {} until {} (revision {})",
            renewal.account_id, record.plan, record.end_date, record.revision
        );
        Ok(record)
    }

    /// Creates a payment order for `plan`. The subscription is only committed
    /// once [`confirm_payment`](Self::confirm_payment) receives a success.
    pub async fn apply_paid_renewal(
        &self,
        account_id: &str,
        plan: &PlanSelection,
    ) -> CoreResult<PaymentIntent> {
        let quote = self.quote(plan, None)?;
        self.require_account(account_id).await?;

        let request = OrderRequest {
            amount: quote.amount,
            metadata: OrderMetadata {
                account_id: account_id.to_string(),
                plan: plan.label(),
            },
        };
        let order = self.gateway.create_order(&request).await?;

        let now = self.clock.now();
        self.store
            .record_payment(&Payment {
                order_id: order.order_id.clone(),
                account_id: account_id.to_string(),
                plan_selection: *plan,
                amount: quote.amount,
                status: PaymentStatus::Created,
                payment_id: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(
            "Payment order {} created for {} ({} INR)",
            order.order_id, account_id, quote.amount
        );

        Ok(PaymentIntent {
            order,
            plan: plan.label(),
            plan_selection: *plan,
            amount: quote.amount,
        })
    }

    /// Handles the gateway's confirmation signal. Safe to call repeatedly for
    /// the same order: a payment is applied to the subscription at most once.
    pub async fn confirm_payment(
        &self,
        account_id: &str,
        confirmation: &PaymentConfirmation,
    ) -> CoreResult<ConfirmationOutcome> {
        let payment = self
            .store
            .find_payment(&confirmation.order_id)
            .await?
            .filter(|p| p.account_id == account_id)
            .ok_or_else(|| CoreError::validation("Unknown payment order"))?;

        if payment.status == PaymentStatus::Paid {
            let current = self.store.get_subscription(account_id).await?;
            return Ok(ConfirmationOutcome::AlreadyApplied(current));
        }

        if !confirmation.success {
            self.store
                .update_payment_status(
                    &payment.order_id,
                    payment.status,
                    PaymentStatus::Failed,
                    confirmation.payment_id.as_deref(),
                )
                .await?;
            warn!("Payment for order {} failed", payment.order_id);
            return Ok(ConfirmationOutcome::Failed);
        }

        let current = self.store.get_subscription(account_id).await?;

        // Applied earlier but the payment status update did not go through.
        if let Some(sub) = current
            .as_ref()
            .filter(|s| s.last_order_id.as_deref() == Some(payment.order_id.as_str()))
        {
            self.mark_paid(&payment, confirmation).await?;
            return Ok(ConfirmationOutcome::AlreadyApplied(Some(sub.clone())));
        }

        let now = self.clock.now();
        let plan = payment.plan_selection;
        let write = SubscriptionWrite {
            plan: plan.label(),
            plan_selection: Some(plan),
            window: paid_renewal_window(current.as_ref(), &plan, now)?,
            amount: payment.amount,
            expected_revision: current.as_ref().map(|s| s.revision),
            order_id: Some(payment.order_id.clone()),
            written_at: now,
        };

        let record = self.store.write_subscription(account_id, &write).await?;
        self.mark_paid(&payment, confirmation).await?;

        info!(
            "Paid renewal for {} via order {}: valid until {}",
            account_id, payment.order_id, record.end_date
        );
        Ok(ConfirmationOutcome::Applied(record))
    }

    async fn mark_paid(&self, payment: &Payment, confirmation: &PaymentConfirmation) -> CoreResult<()> {
        self.store
            .update_payment_status(
                &payment.order_id,
                payment.status,
                PaymentStatus::Paid,
                confirmation.payment_id.as_deref(),
            )
            .await?;
        Ok(())
    }

    async fn require_account(&self, account_id: &str) -> CoreResult<()> {
        match self.store.get_account(account_id).await? {
            Some(_) => Ok(()),
            None => Err(CoreError::validation("Account not found")),
        }
    }
}
