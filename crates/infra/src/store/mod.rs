//! Storage ports and adapters.
//!
//! Catalog and booking reads go through [`CatalogStore`] and [`BookingStore`].
//! Anything that touches a unit counter goes through a [`StoreTx`] opened with
//! [`Transactional::begin`]: changes become visible on `commit` and are discarded
//! when the transaction is dropped.

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use hotelmenu_bookings::{Booking, BookingStatus, StayDates};
use hotelmenu_catalog::{CanonicalProduct, Category, Hotel, HotelMembership, Product, ProductType};
use hotelmenu_core::{BookingId, HotelId, ProductId, UserId};
use hotelmenu_inventory::RoomInventory;

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write (e.g. hotel slug).
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// The transaction lost against a concurrent one (serialization failure,
    /// deadlock). Safe to retry from the start.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Result of a unit counter update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitUpdate {
    /// Counter moved; carries the new state.
    Applied(RoomInventory),
    /// No unit left to reserve. Nothing was written.
    Exhausted,
    /// The product has no unit counter (food).
    NotTracked,
}

/// How `compare` picks the products to line up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductMatch {
    /// Case-insensitive SKU match.
    Sku(String),
    /// Exact match on the already-normalized name.
    NormalizedName(String),
}

/// One sort key of a product listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductOrdering {
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
}

impl ProductOrdering {
    /// Parse a comma-separated `ordering` parameter such as `-price,name`.
    /// Unknown keys are dropped.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split(',')
            .filter_map(|key| match key.trim() {
                "price" => Some(Self::PriceAsc),
                "-price" => Some(Self::PriceDesc),
                "name" => Some(Self::NameAsc),
                "-name" => Some(Self::NameDesc),
                _ => None,
            })
            .collect()
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::PriceAsc => "price ASC",
            Self::PriceDesc => "price DESC",
            Self::NameAsc => "name ASC",
            Self::NameDesc => "name DESC",
        }
    }

    pub fn compare(self, a: &Product, b: &Product) -> Ordering {
        match self {
            Self::PriceAsc => a.price().amount().cmp(&b.price().amount()),
            Self::PriceDesc => b.price().amount().cmp(&a.price().amount()),
            Self::NameAsc => a.name().cmp(b.name()),
            Self::NameDesc => b.name().cmp(a.name()),
        }
    }
}

/// Filter for [`CatalogStore::list_products`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub hotel_id: HotelId,
    pub product_type: ProductType,
    /// Every term must occur, case-insensitively, in the name, description,
    /// normalized name or SKU.
    pub search_terms: Vec<String>,
    /// Applied in order; ties fall back to creation order.
    pub ordering: Vec<ProductOrdering>,
}

impl ProductQuery {
    pub fn new(hotel_id: HotelId, product_type: ProductType) -> Self {
        Self {
            hotel_id,
            product_type,
            search_terms: Vec::new(),
            ordering: Vec::new(),
        }
    }

    /// Split a free-text search on whitespace and commas.
    pub fn with_search(mut self, raw: &str) -> Self {
        self.search_terms = raw
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();
        self
    }

    pub fn with_ordering(mut self, ordering: Vec<ProductOrdering>) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn matches(&self, product: &Product) -> bool {
        if product.hotel_id() != self.hotel_id
            || product.product_type() != self.product_type
            || product.is_archived()
        {
            return false;
        }
        let fields = [
            product.name().to_lowercase(),
            product.description().to_lowercase(),
            product.normalized_name().to_lowercase(),
            product.sku().to_lowercase(),
        ];
        self.search_terms
            .iter()
            .all(|term| fields.iter().any(|f| f.contains(term.as_str())))
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_hotel(&self, hotel: &Hotel) -> Result<(), StoreError>;
    async fn get_hotel(&self, id: HotelId) -> Result<Option<Hotel>, StoreError>;
    /// Slug lookup is case-insensitive.
    async fn find_hotel_by_slug(&self, slug: &str) -> Result<Option<Hotel>, StoreError>;
    async fn list_hotels(&self) -> Result<Vec<Hotel>, StoreError>;

    async fn insert_membership(&self, membership: &HotelMembership) -> Result<(), StoreError>;
    /// Insert `membership` only if the hotel has no members yet, as one atomic
    /// step. Returns whether it was inserted.
    async fn claim_first_membership(
        &self,
        membership: &HotelMembership,
    ) -> Result<bool, StoreError>;
    async fn get_membership(
        &self,
        user_id: UserId,
        hotel_id: HotelId,
    ) -> Result<Option<HotelMembership>, StoreError>;
    async fn list_members(&self, hotel_id: HotelId) -> Result<Vec<HotelMembership>, StoreError>;

    async fn insert_category(&self, category: &Category) -> Result<(), StoreError>;
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;
    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError>;

    async fn insert_canonical(&self, canonical: &CanonicalProduct) -> Result<(), StoreError>;
    async fn list_canonicals(&self) -> Result<Vec<CanonicalProduct>, StoreError>;

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;
    /// Non-archived products of one hotel and type.
    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, StoreError>;
    /// Non-archived products across hotels, cheapest first.
    async fn compare_products(&self, by: &ProductMatch) -> Result<Vec<Product>, StoreError>;
    /// Sets the archived flag. Unit counters are left alone.
    async fn archive_product(
        &self,
        id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;
    /// Bookings of a product whose status is one of `statuses`.
    async fn query_bookings(
        &self,
        product_id: ProductId,
        statuses: &[BookingStatus],
    ) -> Result<Vec<Booking>, StoreError>;
    /// Bookings made by `user_id` plus bookings on products of hotels the user is
    /// a member of. Newest first, no duplicates.
    async fn list_visible_bookings(&self, user_id: UserId) -> Result<Vec<Booking>, StoreError>;
}

/// One open storage transaction.
#[async_trait]
pub trait StoreTx: Send {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Atomic check-and-decrement of the product's available units.
    async fn reserve_unit(&mut self, id: ProductId) -> Result<UnitUpdate, StoreError>;

    /// Increment of the product's available units, capped at the total.
    async fn release_unit(&mut self, id: ProductId) -> Result<UnitUpdate, StoreError>;

    /// Active bookings of the product overlapping `stay`.
    async fn count_overlapping(
        &mut self,
        product_id: ProductId,
        stay: &StayDates,
    ) -> Result<usize, StoreError>;

    /// Reads a booking and holds it against concurrent status changes until the
    /// transaction ends.
    async fn lock_booking(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError>;

    async fn set_booking_status(
        &mut self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Transactional: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}
