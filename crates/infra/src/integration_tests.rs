//! Integration tests for the booking pipeline.
//!
//! Tests: CatalogService → BookingLifecycle → InventoryLedger → store, with the
//! AvailabilityOracle reading the result.
//!
//! Verifies:
//! - The last unit is never sold twice, also under concurrency
//! - Failed bookings leave the counter untouched
//! - Transaction conflicts are retried once

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use hotelmenu_bookings::{Booking, BookingStatus, StayDates};
    use hotelmenu_catalog::{NewHotel, NewProduct, Product};
    use hotelmenu_core::{BookingId, Entity, HotelId, ProductId, UserId};

    use crate::availability::AvailabilityOracle;
    use crate::catalog::CatalogService;
    use crate::ledger::InventoryLedger;
    use crate::lifecycle::{AdmissionPolicy, BookingError, BookingLifecycle, BookingRequest};
    use crate::store::{
        CatalogStore, InMemoryStore, StoreError, StoreTx, Transactional, UnitUpdate,
    };

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    struct Fixture {
        store: InMemoryStore,
        catalog: CatalogService,
        lifecycle: BookingLifecycle,
        oracle: AvailabilityOracle,
        staff: UserId,
        hotel_id: HotelId,
    }

    impl Fixture {
        async fn new(policy: AdmissionPolicy) -> Self {
            let store = InMemoryStore::new();
            let shared = Arc::new(store.clone());
            let catalog = CatalogService::new(shared.clone());
            let lifecycle = BookingLifecycle::new(shared.clone(), shared.clone(), policy);
            let oracle = AvailabilityOracle::new(shared.clone(), shared);

            let hotel = catalog
                .create_hotel(NewHotel {
                    name: "Test Hotel".to_string(),
                    slug: "test-hotel".to_string(),
                    address: "Moi Avenue".to_string(),
                    city: Some("Nairobi".to_string()),
                    timezone: None,
                })
                .await
                .unwrap();
            let staff = UserId::new();
            catalog
                .add_member(Some(staff), hotel.id, staff, true)
                .await
                .unwrap();

            Self {
                store,
                catalog,
                lifecycle,
                oracle,
                staff,
                hotel_id: hotel.id,
            }
        }

        async fn product(&self, product_type: &str, price: i64, units: u32) -> ProductId {
            self.catalog
                .create_product(
                    Some(self.staff),
                    NewProduct {
                        hotel_id: self.hotel_id,
                        product_type: product_type.to_string(),
                        name: "Deluxe Room".to_string(),
                        sku: Some("room-123".to_string()),
                        canonical_id: None,
                        category_id: None,
                        description: None,
                        price: Decimal::from(price),
                        currency: None,
                        total_units: Some(units),
                        extra_meta: None,
                    },
                )
                .await
                .unwrap()
                .id()
        }

        async fn stored(&self, id: ProductId) -> Product {
            self.store.get_product(id).await.unwrap().unwrap()
        }

        async fn available_units(&self, id: ProductId) -> u32 {
            self.stored(id).await.inventory().unwrap().available_units()
        }
    }

    fn request(product_id: ProductId, check_in: &str, check_out: &str) -> BookingRequest {
        BookingRequest {
            product_id,
            check_in: d(check_in),
            check_out: d(check_out),
            party_size: 2,
            requester: None,
            guest_name: "Test Guest".to_string(),
        }
    }

    #[tokio::test]
    async fn booking_last_unit_then_second_attempt_fails() {
        let fx = Fixture::new(AdmissionPolicy::CounterOnly).await;
        let room = fx.product("room", 150, 1).await;

        let booking = fx
            .lifecycle
            .create_booking(request(room, "2023-12-01", "2023-12-05"))
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_price.amount(), Decimal::from(600));
        assert_eq!(fx.available_units(room).await, 0);
        assert!(!fx.stored(room).await.is_available());

        // Any dates, even ones that do not overlap.
        let err = fx
            .lifecycle
            .create_booking(request(room, "2024-01-10", "2024-01-11"))
            .await
            .unwrap_err();
        assert_eq!(err, BookingError::NoUnitsAvailable(room));
        assert_eq!(fx.available_units(room).await, 0);
        assert_eq!(fx.lifecycle.list_visible(Some(fx.staff)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn created_booking_reads_back_identically() {
        let fx = Fixture::new(AdmissionPolicy::CounterOnly).await;
        let room = fx.product("room", 150, 2).await;

        let created = fx
            .lifecycle
            .create_booking(request(room, "2023-12-01", "2023-12-05"))
            .await
            .unwrap();
        let read = fx.lifecycle.get_booking(created.id).await.unwrap();
        assert_eq!(read.stay, created.stay);
        assert_eq!(read.total_price, created.total_price);
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn availability_uses_half_open_ranges() {
        let fx = Fixture::new(AdmissionPolicy::CounterOnly).await;
        let room = fx.product("room", 150, 3).await;
        fx.lifecycle
            .create_booking(request(room, "2023-12-01", "2023-12-05"))
            .await
            .unwrap();

        let oracle = &fx.oracle;
        assert!(oracle.is_available(room, d("2023-12-05"), d("2023-12-10")).await.unwrap());
        assert!(oracle.is_available(room, d("2023-11-25"), d("2023-12-01")).await.unwrap());
        assert!(!oracle.is_available(room, d("2023-12-04"), d("2023-12-06")).await.unwrap());
        assert!(!oracle.is_available(room, d("2023-11-30"), d("2023-12-02")).await.unwrap());
    }

    #[tokio::test]
    async fn availability_ignores_cancelled_bookings() {
        let fx = Fixture::new(AdmissionPolicy::CounterOnly).await;
        let room = fx.product("room", 150, 1).await;
        let booking = fx
            .lifecycle
            .create_booking(request(room, "2023-12-01", "2023-12-05"))
            .await
            .unwrap();
        fx.lifecycle.cancel_booking(booking.id).await.unwrap();

        assert!(fx
            .oracle
            .is_available(room, d("2023-12-02"), d("2023-12-03"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn availability_rejects_bad_input() {
        let fx = Fixture::new(AdmissionPolicy::CounterOnly).await;
        let room = fx.product("room", 150, 1).await;

        let err = fx
            .oracle
            .is_available(room, d("2023-12-05"), d("2023-12-05"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidDateRange { .. }));

        let missing = ProductId::new();
        let err = fx
            .oracle
            .is_available(missing, d("2023-12-01"), d("2023-12-05"))
            .await
            .unwrap_err();
        assert_eq!(err, BookingError::ProductNotFound(missing));
    }

    #[tokio::test]
    async fn rejected_requests_do_not_touch_inventory() {
        let fx = Fixture::new(AdmissionPolicy::CounterOnly).await;
        let room = fx.product("room", 150, 1).await;
        let food = fx.product("food", 5, 0).await;

        let err = fx
            .lifecycle
            .create_booking(request(room, "2023-12-05", "2023-12-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidDateRange { .. }));

        let mut empty_party = request(room, "2023-12-01", "2023-12-05");
        empty_party.party_size = 0;
        assert_eq!(
            fx.lifecycle.create_booking(empty_party).await.unwrap_err(),
            BookingError::InvalidPartySize(0)
        );

        let missing = ProductId::new();
        assert_eq!(
            fx.lifecycle
                .create_booking(request(missing, "2023-12-01", "2023-12-05"))
                .await
                .unwrap_err(),
            BookingError::ProductNotFound(missing)
        );

        let err = fx
            .lifecycle
            .create_booking(request(food, "2023-12-01", "2023-12-05"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotBookable { .. }));

        assert_eq!(fx.available_units(room).await, 1);
    }

    #[tokio::test]
    async fn archived_rooms_cannot_be_booked() {
        let fx = Fixture::new(AdmissionPolicy::CounterOnly).await;
        let room = fx.product("room", 150, 1).await;
        fx.catalog.archive_product(Some(fx.staff), room).await.unwrap();

        let err = fx
            .lifecycle
            .create_booking(request(room, "2023-12-01", "2023-12-05"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotBookable { .. }));
        assert_eq!(fx.available_units(room).await, 1);
    }

    #[tokio::test]
    async fn cancellation_releases_the_unit() {
        let fx = Fixture::new(AdmissionPolicy::CounterOnly).await;
        let room = fx.product("room", 150, 1).await;

        let booking = fx
            .lifecycle
            .create_booking(request(room, "2023-12-01", "2023-12-05"))
            .await
            .unwrap();
        let confirmed = fx.lifecycle.confirm_booking(booking.id).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(fx.available_units(room).await, 0);

        let cancelled = fx.lifecycle.cancel_booking(booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(fx.available_units(room).await, 1);
        assert!(fx.stored(room).await.is_available());

        let err = fx.lifecycle.cancel_booking(booking.id).await.unwrap_err();
        assert_eq!(
            err,
            BookingError::InvalidTransition {
                from: BookingStatus::Cancelled,
                to: BookingStatus::Cancelled
            }
        );
        assert_eq!(fx.available_units(room).await, 1);

        // The freed unit can be booked again.
        fx.lifecycle
            .create_booking(request(room, "2023-12-01", "2023-12-05"))
            .await
            .unwrap();
        assert_eq!(fx.available_units(room).await, 0);
    }

    #[tokio::test]
    async fn unknown_booking_is_reported() {
        let fx = Fixture::new(AdmissionPolicy::CounterOnly).await;
        let id = BookingId::new();
        assert_eq!(
            fx.lifecycle.confirm_booking(id).await.unwrap_err(),
            BookingError::BookingNotFound(id)
        );
        assert_eq!(
            fx.lifecycle.get_booking(id).await.unwrap_err(),
            BookingError::BookingNotFound(id)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_bookings_never_oversell() {
        let fx = Fixture::new(AdmissionPolicy::CounterOnly).await;
        let units = 3;
        let attempts = 12;
        let room = fx.product("room", 150, units).await;

        let mut handles = Vec::new();
        for _ in 0..attempts {
            let lifecycle = fx.lifecycle.clone();
            handles.push(tokio::spawn(async move {
                lifecycle
                    .create_booking(request(room, "2023-12-01", "2023-12-05"))
                    .await
            }));
        }

        let mut succeeded = 0;
        let mut sold_out = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(BookingError::NoUnitsAvailable(_)) => sold_out += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, units);
        assert_eq!(sold_out, attempts - units);
        assert_eq!(fx.available_units(room).await, 0);
    }

    #[tokio::test]
    async fn visibility_covers_own_and_staff_bookings() {
        let fx = Fixture::new(AdmissionPolicy::CounterOnly).await;
        let room = fx.product("room", 150, 5).await;
        let guest = UserId::new();
        let stranger = UserId::new();

        let mut mine = request(room, "2023-12-01", "2023-12-05");
        mine.requester = Some(guest);
        let booking = fx.lifecycle.create_booking(mine).await.unwrap();
        fx.lifecycle
            .create_booking(request(room, "2023-12-01", "2023-12-05"))
            .await
            .unwrap();

        let seen: Vec<Booking> = fx.lifecycle.list_visible(Some(guest)).await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, booking.id);

        assert_eq!(fx.lifecycle.list_visible(Some(fx.staff)).await.unwrap().len(), 2);
        assert!(fx.lifecycle.list_visible(Some(stranger)).await.unwrap().is_empty());
        assert!(fx.lifecycle.list_visible(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlap_policy_refuses_fully_booked_dates() {
        let fx = Fixture::new(AdmissionPolicy::CounterAndOverlap).await;
        let room = fx.product("room", 150, 1).await;
        fx.lifecycle
            .create_booking(request(room, "2023-12-01", "2023-12-05"))
            .await
            .unwrap();

        // Staff hands the unit back (e.g. early checkout) while the booking
        // stays active.
        let ledger = InventoryLedger::new(Arc::new(fx.store.clone()));
        ledger.release_unit(room).await.unwrap();
        assert_eq!(fx.available_units(room).await, 1);

        let err = fx
            .lifecycle
            .create_booking(request(room, "2023-12-03", "2023-12-04"))
            .await
            .unwrap_err();
        assert_eq!(err, BookingError::DatesUnavailable(room));
        assert_eq!(fx.available_units(room).await, 1);

        fx.lifecycle
            .create_booking(request(room, "2023-12-05", "2023-12-07"))
            .await
            .unwrap();
        assert_eq!(fx.available_units(room).await, 0);
    }

    #[tokio::test]
    async fn counter_only_policy_ignores_dates() {
        let fx = Fixture::new(AdmissionPolicy::CounterOnly).await;
        let room = fx.product("room", 150, 2).await;
        fx.lifecycle
            .create_booking(request(room, "2023-12-01", "2023-12-05"))
            .await
            .unwrap();
        fx.lifecycle
            .create_booking(request(room, "2023-12-01", "2023-12-05"))
            .await
            .unwrap();
        assert_eq!(fx.available_units(room).await, 0);
    }

    /// Fails the first `conflicts` commits with `StoreError::Conflict`.
    struct FlakyStore {
        inner: InMemoryStore,
        conflicts: Arc<AtomicUsize>,
    }

    struct FlakyTx {
        inner: Box<dyn StoreTx>,
        conflicts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transactional for FlakyStore {
        async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
            Ok(Box::new(FlakyTx {
                inner: self.inner.begin().await?,
                conflicts: self.conflicts.clone(),
            }))
        }
    }

    #[async_trait]
    impl StoreTx for FlakyTx {
        async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
            self.inner.get_product(id).await
        }

        async fn reserve_unit(&mut self, id: ProductId) -> Result<UnitUpdate, StoreError> {
            self.inner.reserve_unit(id).await
        }

        async fn release_unit(&mut self, id: ProductId) -> Result<UnitUpdate, StoreError> {
            self.inner.release_unit(id).await
        }

        async fn count_overlapping(
            &mut self,
            product_id: ProductId,
            stay: &StayDates,
        ) -> Result<usize, StoreError> {
            self.inner.count_overlapping(product_id, stay).await
        }

        async fn lock_booking(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError> {
            self.inner.lock_booking(id).await
        }

        async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
            self.inner.insert_booking(booking).await
        }

        async fn set_booking_status(
            &mut self,
            id: BookingId,
            status: BookingStatus,
        ) -> Result<(), StoreError> {
            self.inner.set_booking_status(id, status).await
        }

        async fn commit(self: Box<Self>) -> Result<(), StoreError> {
            let FlakyTx { inner, conflicts } = *self;
            let fail = conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if fail {
                return Err(StoreError::Conflict("could not serialize access".to_string()));
            }
            inner.commit().await
        }
    }

    async fn flaky_fixture(conflicts: usize) -> (Fixture, BookingLifecycle, Arc<AtomicUsize>) {
        let fx = Fixture::new(AdmissionPolicy::CounterOnly).await;
        let counter = Arc::new(AtomicUsize::new(conflicts));
        let flaky = Arc::new(FlakyStore {
            inner: fx.store.clone(),
            conflicts: counter.clone(),
        });
        let lifecycle =
            BookingLifecycle::new(flaky, Arc::new(fx.store.clone()), AdmissionPolicy::CounterOnly);
        (fx, lifecycle, counter)
    }

    #[tokio::test]
    async fn storage_conflict_is_retried_once() {
        let (fx, lifecycle, counter) = flaky_fixture(1).await;
        let room = fx.product("room", 150, 2).await;

        let booking = lifecycle
            .create_booking(request(room, "2023-12-01", "2023-12-05"))
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        // The first attempt was rolled back, so only one unit is gone.
        assert_eq!(fx.available_units(room).await, 1);
        assert_eq!(fx.lifecycle.get_booking(booking.id).await.unwrap(), booking);
    }

    #[tokio::test]
    async fn repeated_conflict_is_surfaced() {
        let (fx, lifecycle, _) = flaky_fixture(2).await;
        let room = fx.product("room", 150, 1).await;

        let err = lifecycle
            .create_booking(request(room, "2023-12-01", "2023-12-05"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::StorageConflict(_)));
        assert_eq!(fx.available_units(room).await, 1);
        assert!(fx.lifecycle.list_visible(Some(fx.staff)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn prices_beyond_storage_precision_are_refused() {
        let fx = Fixture::new(AdmissionPolicy::CounterOnly).await;

        let err = fx
            .catalog
            .create_product(
                Some(fx.staff),
                NewProduct {
                    hotel_id: fx.hotel_id,
                    product_type: "room".to_string(),
                    name: "Presidential".to_string(),
                    sku: None,
                    canonical_id: None,
                    category_id: None,
                    description: None,
                    price: Decimal::from_scientific("1e28").unwrap(),
                    currency: None,
                    total_units: Some(1),
                    extra_meta: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, crate::catalog::CatalogError::Invalid(_)));
    }

    #[tokio::test]
    async fn booking_total_overflow_is_an_error_and_keeps_the_unit() {
        let fx = Fixture::new(AdmissionPolicy::CounterOnly).await;
        let room = fx.product("room", 99_999_999, 1).await;

        let err = fx
            .lifecycle
            .create_booking(request(room, "2023-12-01", "2023-12-11"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::TotalOutOfRange(_)));
        assert_eq!(fx.available_units(room).await, 1);

        // One night still fits.
        let booking = fx
            .lifecycle
            .create_booking(request(room, "2023-12-01", "2023-12-02"))
            .await
            .unwrap();
        assert_eq!(booking.total_price.amount(), Decimal::from(99_999_999));
    }
}
