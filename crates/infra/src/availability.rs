use std::sync::Arc;

use chrono::NaiveDate;

use hotelmenu_bookings::{BookingStatus, StayDates};
use hotelmenu_core::ProductId;

use crate::lifecycle::BookingError;
use crate::store::{BookingStore, CatalogStore};

/// Answers "is this product free for these dates?" from committed bookings.
///
/// Read-only and advisory: a `true` answer reserves nothing, and a booking may
/// still be refused (or admitted) by the unit counter afterwards.
#[derive(Clone)]
pub struct AvailabilityOracle {
    catalog: Arc<dyn CatalogStore>,
    bookings: Arc<dyn BookingStore>,
}

impl AvailabilityOracle {
    pub fn new(catalog: Arc<dyn CatalogStore>, bookings: Arc<dyn BookingStore>) -> Self {
        Self { catalog, bookings }
    }

    pub async fn is_available(
        &self,
        product_id: ProductId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<bool, BookingError> {
        let stay = StayDates::new(check_in, check_out)?;

        if self.catalog.get_product(product_id).await?.is_none() {
            return Err(BookingError::ProductNotFound(product_id));
        }

        let active = self
            .bookings
            .query_bookings(product_id, &BookingStatus::ACTIVE)
            .await?;
        let available = hotelmenu_bookings::is_available(&active, product_id, &stay);

        tracing::debug!(
            product_id = %product_id,
            %check_in,
            %check_out,
            available,
            "availability checked"
        );
        Ok(available)
    }
}
