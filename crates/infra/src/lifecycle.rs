//! Booking Lifecycle: create, confirm and cancel bookings, each as one store
//! transaction covering both the unit counter and the booking record.

use core::future::Future;
use core::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use thiserror::Error;

use hotelmenu_bookings::{Booking, BookingRuleError, BookingStatus, NewBooking, StayDates};
use hotelmenu_core::{BookingId, DomainError, ProductId, UserId};

use crate::ledger::{InventoryLedger, LedgerError, LedgerOutcome};
use crate::store::{BookingStore, StoreError, Transactional};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookingError {
    #[error("check_out ({check_out}) must be after check_in ({check_in})")]
    InvalidDateRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("party size must be at least 1 (got {0})")]
    InvalidPartySize(u32),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("product {product_id} cannot be booked: {reason}")]
    NotBookable {
        product_id: ProductId,
        reason: &'static str,
    },

    #[error("no units available for product {0}")]
    NoUnitsAvailable(ProductId),

    #[error("all units of product {0} are already booked for those dates")]
    DatesUnavailable(ProductId),

    #[error("booking {0} not found")]
    BookingNotFound(BookingId),

    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("booking total out of range: {0}")]
    TotalOutOfRange(String),

    /// Lost against a concurrent transaction, even after one retry.
    #[error("storage conflict: {0}")]
    StorageConflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => BookingError::StorageConflict(msg),
            other => BookingError::Store(other),
        }
    }
}

impl From<BookingRuleError> for BookingError {
    fn from(err: BookingRuleError) -> Self {
        match err {
            BookingRuleError::InvalidDateRange {
                check_in,
                check_out,
            } => BookingError::InvalidDateRange {
                check_in,
                check_out,
            },
            BookingRuleError::InvalidPartySize(n) => BookingError::InvalidPartySize(n),
            BookingRuleError::InvalidTransition { from, to } => {
                BookingError::InvalidTransition { from, to }
            }
            BookingRuleError::TotalOutOfRange(msg) => BookingError::TotalOutOfRange(msg),
        }
    }
}

impl From<LedgerError> for BookingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Exhausted(id) => BookingError::NoUnitsAvailable(id),
            LedgerError::ProductNotFound(id) => BookingError::ProductNotFound(id),
            LedgerError::Store(e) => e.into(),
        }
    }
}

/// What gates admission of a new booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdmissionPolicy {
    /// Only the unit counter decides. Dates are not compared.
    #[default]
    CounterOnly,
    /// The counter, plus a refusal when the active bookings overlapping the
    /// requested stay already use every unit of the room type.
    CounterAndOverlap,
}

impl FromStr for AdmissionPolicy {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "counter_only" | "counter" => Ok(AdmissionPolicy::CounterOnly),
            "counter_and_overlap" | "overlap" => Ok(AdmissionPolicy::CounterAndOverlap),
            other => Err(DomainError::validation(format!(
                "unknown admission policy '{other}' (expected counter_only or counter_and_overlap)"
            ))),
        }
    }
}

/// Input of [`BookingLifecycle::create_booking`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub product_id: ProductId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub party_size: u32,
    pub requester: Option<UserId>,
    pub guest_name: String,
}

#[derive(Clone)]
pub struct BookingLifecycle {
    transactions: Arc<dyn Transactional>,
    bookings: Arc<dyn BookingStore>,
    policy: AdmissionPolicy,
}

impl BookingLifecycle {
    pub fn new(
        transactions: Arc<dyn Transactional>,
        bookings: Arc<dyn BookingStore>,
        policy: AdmissionPolicy,
    ) -> Self {
        Self {
            transactions,
            bookings,
            policy,
        }
    }

    /// Reserve one unit and record a pending booking, atomically.
    ///
    /// On any error nothing is written: the counter and the booking table are
    /// left as they were.
    pub async fn create_booking(&self, request: BookingRequest) -> Result<Booking, BookingError> {
        let stay = StayDates::new(request.check_in, request.check_out)?;
        if request.party_size < 1 {
            return Err(BookingError::InvalidPartySize(request.party_size));
        }

        let booking = retry_once("create_booking", || self.try_create(&request, stay)).await?;

        tracing::info!(
            booking_id = %booking.id,
            product_id = %booking.product_id,
            check_in = %booking.stay.check_in(),
            check_out = %booking.stay.check_out(),
            total_price = %booking.total_price,
            "booking created"
        );
        Ok(booking)
    }

    async fn try_create(
        &self,
        request: &BookingRequest,
        stay: StayDates,
    ) -> Result<Booking, BookingError> {
        let product_id = request.product_id;
        let mut tx = self.transactions.begin().await?;

        let product = tx
            .get_product(product_id)
            .await?
            .ok_or(BookingError::ProductNotFound(product_id))?;
        if product.is_archived() {
            return Err(BookingError::NotBookable {
                product_id,
                reason: "product is archived",
            });
        }
        let (Some(rate), Some(inventory)) = (product.nightly_rate(), product.inventory()) else {
            return Err(BookingError::NotBookable {
                product_id,
                reason: "only rooms can be booked",
            });
        };

        match InventoryLedger::reserve_unit_in(&mut *tx, product_id).await? {
            LedgerOutcome::Reserved(_) => {}
            LedgerOutcome::Released(_) | LedgerOutcome::NotTracked => {
                return Err(BookingError::NotBookable {
                    product_id,
                    reason: "product has no unit counter",
                });
            }
        }

        if self.policy == AdmissionPolicy::CounterAndOverlap {
            let overlapping = tx.count_overlapping(product_id, &stay).await?;
            // The reserved unit is rolled back with the transaction.
            if overlapping >= inventory.total_units() as usize {
                tracing::info!(
                    product_id = %product_id,
                    overlapping,
                    total_units = inventory.total_units(),
                    "dates fully booked"
                );
                return Err(BookingError::DatesUnavailable(product_id));
            }
        }

        let booking = Booking::create(
            BookingId::new(),
            NewBooking {
                product_id,
                requester: request.requester,
                guest_name: request.guest_name.clone(),
                stay,
                party_size: request.party_size,
            },
            rate,
            Utc::now(),
        )?;

        tx.insert_booking(&booking).await?;
        tx.commit().await?;
        Ok(booking)
    }

    /// pending -> confirmed.
    pub async fn confirm_booking(&self, id: BookingId) -> Result<Booking, BookingError> {
        let booking = retry_once("confirm_booking", || self.try_confirm(id)).await?;
        tracing::info!(booking_id = %id, "booking confirmed");
        Ok(booking)
    }

    async fn try_confirm(&self, id: BookingId) -> Result<Booking, BookingError> {
        let mut tx = self.transactions.begin().await?;
        let booking = tx
            .lock_booking(id)
            .await?
            .ok_or(BookingError::BookingNotFound(id))?;

        let confirmed = booking.confirm()?;
        tx.set_booking_status(id, confirmed.status).await?;
        tx.commit().await?;
        Ok(confirmed)
    }

    /// pending|confirmed -> cancelled, giving the unit back in the same
    /// transaction.
    pub async fn cancel_booking(&self, id: BookingId) -> Result<Booking, BookingError> {
        let booking = retry_once("cancel_booking", || self.try_cancel(id)).await?;
        tracing::info!(booking_id = %id, product_id = %booking.product_id, "booking cancelled");
        Ok(booking)
    }

    async fn try_cancel(&self, id: BookingId) -> Result<Booking, BookingError> {
        let mut tx = self.transactions.begin().await?;
        let booking = tx
            .lock_booking(id)
            .await?
            .ok_or(BookingError::BookingNotFound(id))?;

        let cancelled = booking.cancel()?;
        tx.set_booking_status(id, cancelled.status).await?;
        InventoryLedger::release_unit_in(&mut *tx, cancelled.product_id).await?;
        tx.commit().await?;
        Ok(cancelled)
    }

    pub async fn get_booking(&self, id: BookingId) -> Result<Booking, BookingError> {
        self.bookings
            .get_booking(id)
            .await?
            .ok_or(BookingError::BookingNotFound(id))
    }

    /// Bookings the requester made, plus every booking on products of hotels
    /// they are staff of. Anonymous requesters see nothing.
    pub async fn list_visible(&self, requester: Option<UserId>) -> Result<Vec<Booking>, BookingError> {
        let Some(user_id) = requester else {
            return Ok(vec![]);
        };
        let bookings = self.bookings.list_visible_bookings(user_id).await?;
        tracing::debug!(user_id = %user_id, count = bookings.len(), "listed bookings");
        Ok(bookings)
    }
}

/// Run `attempt`; on `StorageConflict` run it exactly once more.
async fn retry_once<T, F, Fut>(operation: &'static str, mut attempt: F) -> Result<T, BookingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BookingError>>,
{
    match attempt().await {
        Err(BookingError::StorageConflict(reason)) => {
            tracing::warn!(operation, %reason, "storage conflict, retrying once");
            attempt().await
        }
        other => other,
    }
}
