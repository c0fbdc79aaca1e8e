use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::booking::BookingRuleError;

/// A stay as the half-open date range `[check_in, check_out)`.
///
/// The checkout day is not occupied, so a guest leaving on the 5th does not
/// conflict with one arriving on the 5th.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawStayDates", into = "RawStayDates")]
pub struct StayDates {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

#[derive(Serialize, Deserialize)]
struct RawStayDates {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl TryFrom<RawStayDates> for StayDates {
    type Error = BookingRuleError;

    fn try_from(raw: RawStayDates) -> Result<Self, Self::Error> {
        Self::new(raw.check_in, raw.check_out)
    }
}

impl From<StayDates> for RawStayDates {
    fn from(value: StayDates) -> Self {
        Self {
            check_in: value.check_in,
            check_out: value.check_out,
        }
    }
}

impl StayDates {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, BookingRuleError> {
        if check_out <= check_in {
            return Err(BookingRuleError::InvalidDateRange {
                check_in,
                check_out,
            });
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    /// Number of nights, never less than one.
    pub fn nights(&self) -> u32 {
        let days = (self.check_out - self.check_in).num_days();
        u32::try_from(days).unwrap_or(u32::MAX).max(1)
    }

    /// `a_start < b_end && b_start < a_end`.
    pub fn overlaps(&self, other: &StayDates) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}
