use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hotelmenu_core::{BookingId, Entity, Money, ProductId, UserId};

use crate::stay::StayDates;

/// Booking status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    /// Statuses that hold a unit and block the dates.
    pub const ACTIVE: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::Confirmed];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

impl core::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule violations detected while building or moving a booking.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookingRuleError {
    #[error("check_out ({check_out}) must be after check_in ({check_in})")]
    InvalidDateRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("party size must be at least 1 (got {0})")]
    InvalidPartySize(u32),

    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("booking total out of range: {0}")]
    TotalOutOfRange(String),
}

/// Request to book one unit of a room type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub product_id: ProductId,
    pub requester: Option<UserId>,
    pub guest_name: String,
    pub stay: StayDates,
    pub party_size: u32,
}

/// A reservation of one unit for a stay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub product_id: ProductId,
    pub requester: Option<UserId>,
    pub guest_name: String,
    pub stay: StayDates,
    pub party_size: u32,
    /// Fixed at creation; later rate changes do not touch existing bookings.
    pub total_price: Money,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// Price of a stay: nightly rate times the number of nights (at least one).
pub fn quote(nightly_rate: &Money, stay: &StayDates) -> Result<Money, BookingRuleError> {
    nightly_rate
        .times(stay.nights())
        .map_err(|e| BookingRuleError::TotalOutOfRange(e.to_string()))
}

impl Booking {
    /// Build a pending booking priced from `nightly_rate`.
    pub fn create(
        id: BookingId,
        input: NewBooking,
        nightly_rate: &Money,
        now: DateTime<Utc>,
    ) -> Result<Self, BookingRuleError> {
        if input.party_size < 1 {
            return Err(BookingRuleError::InvalidPartySize(input.party_size));
        }
        let total_price = quote(nightly_rate, &input.stay)?;

        Ok(Self {
            id,
            product_id: input.product_id,
            requester: input.requester,
            guest_name: input.guest_name.trim().to_string(),
            total_price,
            stay: input.stay,
            party_size: input.party_size,
            status: BookingStatus::Pending,
            created_at: now,
        })
    }

    /// pending -> confirmed.
    pub fn confirm(&self) -> Result<Self, BookingRuleError> {
        self.transition(BookingStatus::Confirmed, &[BookingStatus::Pending])
    }

    /// pending|confirmed -> cancelled. The caller releases the held unit.
    pub fn cancel(&self) -> Result<Self, BookingRuleError> {
        self.transition(BookingStatus::Cancelled, &BookingStatus::ACTIVE)
    }

    fn transition(
        &self,
        to: BookingStatus,
        allowed_from: &[BookingStatus],
    ) -> Result<Self, BookingRuleError> {
        if !allowed_from.contains(&self.status) {
            return Err(BookingRuleError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        let mut next = self.clone();
        next.status = to;
        Ok(next)
    }
}

impl Entity for Booking {
    type Id = BookingId;

    fn id(&self) -> BookingId {
        self.id
    }
}
