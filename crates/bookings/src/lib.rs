//! Room bookings domain module.
//!
//! Stay dates with half-open overlap semantics, the booking record and its status
//! lifecycle, pricing, and the availability predicate. Deterministic domain logic
//! only (no IO, no HTTP, no storage).

pub mod availability;
pub mod booking;
pub mod stay;

pub use availability::{is_available, overlapping_active};
pub use booking::{quote, Booking, BookingRuleError, BookingStatus, NewBooking};
pub use stay::StayDates;
