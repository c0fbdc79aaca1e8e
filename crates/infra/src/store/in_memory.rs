use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use hotelmenu_bookings::{Booking, BookingStatus, StayDates};
use hotelmenu_catalog::{CanonicalProduct, Category, Hotel, HotelMembership, Product};
use hotelmenu_core::{BookingId, CanonicalId, CategoryId, Entity, HotelId, ProductId, UserId};
use hotelmenu_inventory::{InventoryError, RoomInventory};

use super::{
    BookingStore, CatalogStore, ProductMatch, ProductQuery, StoreError, StoreTx, Transactional,
    UnitUpdate,
};

#[derive(Debug, Default)]
struct MemoryState {
    // Keyed by UUIDv7 ids, so iteration follows creation order.
    hotels: BTreeMap<HotelId, Hotel>,
    memberships: BTreeMap<(HotelId, UserId), HotelMembership>,
    categories: BTreeMap<CategoryId, Category>,
    canonicals: BTreeMap<CanonicalId, CanonicalProduct>,
    products: BTreeMap<ProductId, Product>,
    bookings: BTreeMap<BookingId, Booking>,
}

/// In-memory store for tests/dev.
///
/// Every operation, including a whole transaction, holds the single state lock,
/// so transactions are serialized.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn insert_hotel(&self, hotel: &Hotel) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state
            .hotels
            .values()
            .any(|h| h.slug.eq_ignore_ascii_case(&hotel.slug))
        {
            return Err(StoreError::Duplicate(format!("hotel slug '{}'", hotel.slug)));
        }
        state.hotels.insert(hotel.id, hotel.clone());
        Ok(())
    }

    async fn get_hotel(&self, id: HotelId) -> Result<Option<Hotel>, StoreError> {
        Ok(self.state.lock().await.hotels.get(&id).cloned())
    }

    async fn find_hotel_by_slug(&self, slug: &str) -> Result<Option<Hotel>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .hotels
            .values()
            .find(|h| h.slug.eq_ignore_ascii_case(slug))
            .cloned())
    }

    async fn list_hotels(&self) -> Result<Vec<Hotel>, StoreError> {
        Ok(self.state.lock().await.hotels.values().cloned().collect())
    }

    async fn insert_membership(&self, membership: &HotelMembership) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.hotels.contains_key(&membership.hotel_id) {
            return Err(StoreError::NotFound(format!("hotel {}", membership.hotel_id)));
        }
        let key = (membership.hotel_id, membership.user_id);
        if state.memberships.contains_key(&key) {
            return Err(StoreError::Duplicate(format!(
                "user {} is already a member of hotel {}",
                membership.user_id, membership.hotel_id
            )));
        }
        state.memberships.insert(key, membership.clone());
        Ok(())
    }

    async fn claim_first_membership(
        &self,
        membership: &HotelMembership,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let hotel_id = membership.hotel_id;
        if !state.hotels.contains_key(&hotel_id) {
            return Err(StoreError::NotFound(format!("hotel {hotel_id}")));
        }
        if state.memberships.keys().any(|(h, _)| *h == hotel_id) {
            return Ok(false);
        }
        state
            .memberships
            .insert((hotel_id, membership.user_id), membership.clone());
        Ok(true)
    }

    async fn get_membership(
        &self,
        user_id: UserId,
        hotel_id: HotelId,
    ) -> Result<Option<HotelMembership>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.memberships.get(&(hotel_id, user_id)).cloned())
    }

    async fn list_members(&self, hotel_id: HotelId) -> Result<Vec<HotelMembership>, StoreError> {
        let state = self.state.lock().await;
        let mut members: Vec<_> = state
            .memberships
            .range((hotel_id, UserId::from_uuid(uuid::Uuid::nil()))..)
            .take_while(|((h, _), _)| *h == hotel_id)
            .map(|(_, m)| m.clone())
            .collect();
        members.sort_by_key(|m| m.created_at);
        Ok(members)
    }

    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.categories.values().any(|c| c.slug == category.slug) {
            return Err(StoreError::Duplicate(format!("category slug '{}'", category.slug)));
        }
        state.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        Ok(self.state.lock().await.categories.values().cloned().collect())
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.categories.values().find(|c| c.slug == slug).cloned())
    }

    async fn insert_canonical(&self, canonical: &CanonicalProduct) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.canonicals.insert(canonical.id, canonical.clone());
        Ok(())
    }

    async fn list_canonicals(&self) -> Result<Vec<CanonicalProduct>, StoreError> {
        Ok(self.state.lock().await.canonicals.values().cloned().collect())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.hotels.contains_key(&product.hotel_id()) {
            return Err(StoreError::NotFound(format!("hotel {}", product.hotel_id())));
        }
        if state.products.contains_key(&product.id()) {
            return Err(StoreError::Duplicate(format!("product {}", product.id())));
        }
        state.products.insert(product.id(), product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, StoreError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        // Stable sort keeps creation order between equal keys.
        products.sort_by(|a, b| {
            query
                .ordering
                .iter()
                .map(|key| key.compare(a, b))
                .find(|ord| ord.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(products)
    }

    async fn compare_products(&self, by: &ProductMatch) -> Result<Vec<Product>, StoreError> {
        let state = self.state.lock().await;
        let mut matches: Vec<Product> = state
            .products
            .values()
            .filter(|p| !p.is_archived())
            .filter(|p| match by {
                ProductMatch::Sku(sku) => !p.sku().is_empty() && p.sku().eq_ignore_ascii_case(sku),
                ProductMatch::NormalizedName(name) => p.normalized_name() == name,
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.price().amount().cmp(&b.price().amount()));
        Ok(matches)
    }

    async fn archive_product(
        &self,
        id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError> {
        let mut state = self.state.lock().await;
        let product = state
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("product {id}")))?;
        product.archive(now);
        Ok(product.clone())
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn query_bookings(
        &self,
        product_id: ProductId,
        statuses: &[BookingStatus],
    ) -> Result<Vec<Booking>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .bookings
            .values()
            .filter(|b| b.product_id == product_id && statuses.contains(&b.status))
            .cloned()
            .collect())
    }

    async fn list_visible_bookings(&self, user_id: UserId) -> Result<Vec<Booking>, StoreError> {
        let state = self.state.lock().await;
        let staff_of: BTreeSet<HotelId> = state
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.hotel_id)
            .collect();

        let mut visible: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| {
                b.requester == Some(user_id)
                    || state
                        .products
                        .get(&b.product_id)
                        .is_some_and(|p| staff_of.contains(&p.hotel_id()))
            })
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(visible)
    }
}

#[async_trait]
impl Transactional for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(InMemoryTx {
            guard,
            products: BTreeMap::new(),
            bookings: BTreeMap::new(),
        }))
    }
}

/// Writes are staged on top of the locked state and applied on commit.
struct InMemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    products: BTreeMap<ProductId, Product>,
    bookings: BTreeMap<BookingId, Booking>,
}

impl InMemoryTx {
    fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.get(&id).or_else(|| self.guard.products.get(&id))
    }

    fn booking(&self, id: BookingId) -> Option<&Booking> {
        self.bookings.get(&id).or_else(|| self.guard.bookings.get(&id))
    }

    fn update_units(
        &mut self,
        id: ProductId,
        step: impl FnOnce(RoomInventory) -> Result<RoomInventory, InventoryError>,
    ) -> Result<UnitUpdate, StoreError> {
        let product = self
            .product(id)
            .ok_or_else(|| StoreError::NotFound(format!("product {id}")))?;
        let Some(inventory) = product.inventory() else {
            return Ok(UnitUpdate::NotTracked);
        };
        match step(inventory) {
            Ok(next) => {
                let updated = product.with_inventory(next, Utc::now());
                self.products.insert(id, updated);
                Ok(UnitUpdate::Applied(next))
            }
            Err(InventoryError::Exhausted) => Ok(UnitUpdate::Exhausted),
            Err(other) => Err(StoreError::Backend(other.to_string())),
        }
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.product(id).cloned())
    }

    async fn reserve_unit(&mut self, id: ProductId) -> Result<UnitUpdate, StoreError> {
        self.update_units(id, |inv| inv.reserve())
    }

    async fn release_unit(&mut self, id: ProductId) -> Result<UnitUpdate, StoreError> {
        self.update_units(id, |inv| Ok(inv.release()))
    }

    async fn count_overlapping(
        &mut self,
        product_id: ProductId,
        stay: &StayDates,
    ) -> Result<usize, StoreError> {
        let committed = self
            .guard
            .bookings
            .values()
            .filter(|b| !self.bookings.contains_key(&b.id));
        let bookings = committed.chain(self.bookings.values());
        Ok(hotelmenu_bookings::overlapping_active(bookings, product_id, stay).count())
    }

    async fn lock_booking(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.booking(id).cloned())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        if self.booking(booking.id).is_some() {
            return Err(StoreError::Duplicate(format!("booking {}", booking.id)));
        }
        if self.product(booking.product_id).is_none() {
            return Err(StoreError::NotFound(format!("product {}", booking.product_id)));
        }
        self.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn set_booking_status(
        &mut self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<(), StoreError> {
        let mut booking = self
            .booking(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("booking {id}")))?;
        booking.status = status;
        self.bookings.insert(id, booking);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTx {
            mut guard,
            products,
            bookings,
        } = *self;
        guard.products.extend(products);
        guard.bookings.extend(bookings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotelmenu_catalog::{NewHotel, NewProduct};
    use rust_decimal::Decimal;

    async fn seeded(total_units: u32) -> (InMemoryStore, ProductId) {
        let store = InMemoryStore::new();
        let hotel = Hotel::create(
            HotelId::new(),
            NewHotel {
                name: "Test Hotel".to_string(),
                slug: "test-hotel".to_string(),
                address: String::new(),
                city: None,
                timezone: None,
            },
        )
        .unwrap();
        store.insert_hotel(&hotel).await.unwrap();

        let product = Product::create(
            ProductId::new(),
            NewProduct {
                hotel_id: hotel.id,
                product_type: "room".to_string(),
                name: "Deluxe Room".to_string(),
                sku: None,
                canonical_id: None,
                category_id: None,
                description: None,
                price: Decimal::from(150),
                currency: None,
                total_units: Some(total_units),
                extra_meta: None,
            },
            Utc::now(),
        )
        .unwrap();
        let id = product.id();
        store.insert_product(&product).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn committed_reserve_is_visible() {
        let (store, id) = seeded(2).await;

        let mut tx = store.begin().await.unwrap();
        let update = tx.reserve_unit(id).await.unwrap();
        assert!(matches!(update, UnitUpdate::Applied(inv) if inv.available_units() == 1));
        tx.commit().await.unwrap();

        let product = store.get_product(id).await.unwrap().unwrap();
        assert_eq!(product.inventory().unwrap().available_units(), 1);
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let (store, id) = seeded(1).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.reserve_unit(id).await.unwrap();
            // dropped without commit
        }

        let product = store.get_product(id).await.unwrap().unwrap();
        assert_eq!(product.inventory().unwrap().available_units(), 1);
    }

    #[tokio::test]
    async fn reserve_reports_exhaustion_without_writing() {
        let (store, id) = seeded(1).await;

        let mut tx = store.begin().await.unwrap();
        assert!(matches!(tx.reserve_unit(id).await.unwrap(), UnitUpdate::Applied(_)));
        assert_eq!(tx.reserve_unit(id).await.unwrap(), UnitUpdate::Exhausted);
        tx.commit().await.unwrap();

        let product = store.get_product(id).await.unwrap().unwrap();
        assert_eq!(product.inventory().unwrap().available_units(), 0);
    }

    #[tokio::test]
    async fn reserve_unknown_product_is_not_found() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx.reserve_unit(ProductId::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn hotel_slugs_are_unique_ignoring_case() {
        let (store, _) = seeded(1).await;
        let dup = Hotel::create(
            HotelId::new(),
            NewHotel {
                name: "Other".to_string(),
                slug: "test-hotel".to_string(),
                address: String::new(),
                city: None,
                timezone: None,
            },
        )
        .unwrap();
        assert!(matches!(
            store.insert_hotel(&dup).await.unwrap_err(),
            StoreError::Duplicate(_)
        ));
        assert!(store.find_hotel_by_slug("TEST-HOTEL").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_first_claims_admit_exactly_one() {
        let (store, product_id) = seeded(1).await;
        let hotel_id = store.get_product(product_id).await.unwrap().unwrap().hotel_id();

        let claims: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let membership = HotelMembership {
                        user_id: UserId::new(),
                        hotel_id,
                        is_manager: true,
                        created_at: Utc::now(),
                    };
                    store.claim_first_membership(&membership).await.unwrap()
                })
            })
            .collect();

        let mut won = 0;
        for claim in claims {
            if claim.await.unwrap() {
                won += 1;
            }
        }
        assert_eq!(won, 1);
        assert_eq!(store.list_members(hotel_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn claim_on_unknown_hotel_is_not_found() {
        let store = InMemoryStore::new();
        let membership = HotelMembership {
            user_id: UserId::new(),
            hotel_id: HotelId::new(),
            is_manager: true,
            created_at: Utc::now(),
        };
        assert!(matches!(
            store.claim_first_membership(&membership).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
