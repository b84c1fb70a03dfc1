use std::fmt;
use std::str::FromStr;

use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Nominal subscription length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum PlanDuration {
    #[serde(rename = "1 Month")]
    OneMonth,
    #[serde(rename = "3 Months")]
    ThreeMonths,
    #[serde(rename = "7 Months")]
    SevenMonths,
}

impl PlanDuration {
    pub const ALL: [PlanDuration; 3] = [PlanDuration::OneMonth, PlanDuration::ThreeMonths, PlanDuration::SevenMonths];

    pub fn months(self) -> u32 {
        match self {
            PlanDuration::OneMonth => 1,
            PlanDuration::ThreeMonths => 3,
            PlanDuration::SevenMonths => 7,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlanDuration::OneMonth => "1 Month",
            PlanDuration::ThreeMonths => "3 Months",
            PlanDuration::SevenMonths => "7 Months",
        }
    }
}

/// Time-of-day access tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Shift {
    #[serde(rename = "Full Day")]
    FullDay,
    Morning,
    Evening,
}

impl Shift {
    pub const ALL: [Shift; 3] = [Shift::FullDay, Shift::Morning, Shift::Evening];

    pub fn label(self) -> &'static str {
        match self {
            Shift::FullDay => "Full Day",
            Shift::Morning => "Morning",
            Shift::Evening => "Evening",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum SeatType {
    Regular,
    Special,
}

impl SeatType {
    pub const ALL: [SeatType; 2] = [SeatType::Regular, SeatType::Special];

    pub fn label(self) -> &'static str {
        match self {
            SeatType::Regular => "Regular",
            SeatType::Special => "Special",
        }
    }
}

impl FromStr for PlanDuration {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlanDuration::ALL
            .into_iter()
            .find(|d| d.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                CoreError::validation(format!(
                    "Invalid duration '{}'. Choose '1 Month', '3 Months' or '7 Months'",
                    s
                ))
            })
    }
}

impl FromStr for Shift {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Shift::ALL
            .into_iter()
            .find(|v| v.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                CoreError::validation(format!(
                    "Invalid shift '{}'. Choose 'Full Day', 'Morning' or 'Evening'",
                    s
                ))
            })
    }
}

impl FromStr for SeatType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SeatType::ALL
            .into_iter()
            .find(|v| v.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                CoreError::validation(format!(
                    "Invalid seat type '{}'. Choose 'Regular' or 'Special'",
                    s
                ))
            })
    }
}

/// Optional flat surcharges on top of the base price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct AddOns {
    #[serde(default)]
    pub registration: bool,
    #[serde(default)]
    pub locker: bool,
}

/// A fully validated plan choice. Determines the base price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanSelection {
    pub duration: PlanDuration,
    pub shift: Shift,
    pub seat_type: SeatType,
    #[serde(default)]
    pub add_ons: AddOns,
}

impl PlanSelection {
    pub fn new(duration: PlanDuration, shift: Shift, seat_type: SeatType) -> Self {
        PlanSelection {
            duration,
            shift,
            seat_type,
            add_ons: AddOns::default(),
        }
    }

    pub fn with_add_ons(mut self, add_ons: AddOns) -> Self {
        self.add_ons = add_ons;
        self
    }

    /// Label stored on the subscription record, e.g. `3 Months - Morning - Special Seat`.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PlanSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {} Seat",
            self.duration.label(),
            self.shift.label(),
            self.seat_type.label()
        )
    }
}

/// Plan selection as it arrives over the wire. Labels are checked against the
/// closed sets when converted into a [`PlanSelection`].
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanSelectionDto {
    pub duration: String,
    pub shift: String,
    pub seat_type: String,
    #[serde(default)]
    pub add_ons: Option<AddOns>,
}

impl TryFrom<&PlanSelectionDto> for PlanSelection {
    type Error = CoreError;

    fn try_from(dto: &PlanSelectionDto) -> Result<Self, Self::Error> {
        let plan = PlanSelection::new(
            dto.duration.parse()?,
            dto.shift.parse()?,
            dto.seat_type.parse()?,
        );
        Ok(plan.with_add_ons(dto.add_ons.unwrap_or_default()))
    }
}
