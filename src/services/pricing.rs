//! Closed price table for the study space.
//!
//! Every (duration, shift, seat) combination has exactly one base price in
//! whole rupees. The 7 month tier is "pay for 6, get 1 free" and is stored as
//! that single discounted amount.

use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;

use crate::models::{AddOns, PlanDuration, PlanSelection, SeatType, Shift};

pub const REGISTRATION_FEE: i64 = 150;
pub const LOCKER_FEE: i64 = 100;

pub fn price(duration: PlanDuration, shift: Shift, seat: SeatType) -> i64 {
    use PlanDuration::*;
    use SeatType::*;
    use Shift::*;

    match (duration, shift, seat) {
        (OneMonth, FullDay, Regular) => 850,
        (OneMonth, FullDay, Special) => 950,
        (OneMonth, Morning, Regular) => 650,
        (OneMonth, Morning, Special) => 700,
        (OneMonth, Evening, Regular) => 550,
        (OneMonth, Evening, Special) => 600,

        (ThreeMonths, FullDay, Regular) => 2400,
        (ThreeMonths, FullDay, Special) => 2700,
        (ThreeMonths, Morning, Regular) => 1800,
        (ThreeMonths, Morning, Special) => 2000,
        (ThreeMonths, Evening, Regular) => 1500,
        (ThreeMonths, Evening, Special) => 1700,

        (SevenMonths, FullDay, Regular) => 5100,
        (SevenMonths, FullDay, Special) => 5700,
        (SevenMonths, Morning, Regular) => 3900,
        (SevenMonths, Morning, Special) => 4200,
        (SevenMonths, Evening, Regular) => 3300,
        (SevenMonths, Evening, Special) => 3600,
    }
}

/// Sum of the selected surcharges.
pub fn add_on_total(add_ons: AddOns) -> i64 {
    let mut total = 0;
    if add_ons.registration {
        total += REGISTRATION_FEE;
    }
    if add_ons.locker {
        total += LOCKER_FEE;
    }
    total
}

/// Base price plus surcharges.
pub fn total(plan: &PlanSelection) -> i64 {
    price(plan.duration, plan.shift, plan.seat_type) + add_on_total(plan.add_ons)
}

/// Amount divided by the nominal month count, rounded half up.
pub fn per_month(amount: i64, duration: PlanDuration) -> i64 {
    let months = i64::from(duration.months());
    (2 * amount + months).div_euclid(2 * months)
}

pub fn savings_per_month(duration: PlanDuration, shift: Shift, seat: SeatType) -> i64 {
    if duration == PlanDuration::OneMonth {
        return 0;
    }
    let monthly = price(PlanDuration::OneMonth, shift, seat);
    let this_per_month = per_month(price(duration, shift, seat), duration);
    (monthly - this_per_month).max(0)
}

/// Cheapest base price for a duration, used for "from ₹X" teasers.
pub fn from_price(duration: PlanDuration) -> i64 {
    Shift::ALL
        .into_iter()
        .flat_map(|shift| SeatType::ALL.into_iter().map(move |seat| price(duration, shift, seat)))
        .min()
        .unwrap_or(0)
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriceSheetEntry {
    pub duration: PlanDuration,
    pub shift: Shift,
    pub seat_type: SeatType,
    pub amount: i64,
    pub per_month: i64,
    pub savings_per_month: i64,
}

/// All 18 entries with their derived metrics.
pub fn price_sheet() -> Vec<PriceSheetEntry> {
    let mut entries = Vec::with_capacity(18);
    for duration in PlanDuration::ALL {
        for shift in Shift::ALL {
            for seat in SeatType::ALL {
                let amount = price(duration, shift, seat);
                entries.push(PriceSheetEntry {
                    duration,
                    shift,
                    seat_type: seat,
                    amount,
                    per_month: per_month(amount, duration),
                    savings_per_month: savings_per_month(duration, shift, seat),
                });
            }
        }
    }
    entries
}
