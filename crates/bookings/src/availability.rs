//! Availability predicate over existing bookings.
//!
//! Advisory only: evaluating it does not reserve anything.

use hotelmenu_core::ProductId;

use crate::booking::Booking;
use crate::stay::StayDates;

/// Active (pending or confirmed) bookings of `product_id` whose stay overlaps `stay`.
pub fn overlapping_active<'a, I>(
    bookings: I,
    product_id: ProductId,
    stay: &'a StayDates,
) -> impl Iterator<Item = &'a Booking> + 'a
where
    I: IntoIterator<Item = &'a Booking>,
    I::IntoIter: 'a,
{
    bookings.into_iter().filter(move |b| {
        b.product_id == product_id && b.status.is_active() && b.stay.overlaps(stay)
    })
}

/// `true` iff no active booking of the product overlaps the stay.
pub fn is_available<'a, I>(bookings: I, product_id: ProductId, stay: &'a StayDates) -> bool
where
    I: IntoIterator<Item = &'a Booking>,
    I::IntoIter: 'a,
{
    overlapping_active(bookings, product_id, stay).next().is_none()
}
