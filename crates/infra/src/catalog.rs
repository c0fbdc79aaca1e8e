//! Catalog service: hotels, staff memberships, categories, canonical products,
//! product listings and CSV bulk import.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use hotelmenu_catalog::{
    normalize_name, CanonicalProduct, Category, Hotel, HotelMembership, NewHotel, NewProduct,
    Product, ProductType,
};
use hotelmenu_core::{CanonicalId, CategoryId, DomainError, Entity, HotelId, ProductId, UserId};

use crate::store::{CatalogStore, ProductMatch, ProductOrdering, ProductQuery, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error("hotel {0} not found")]
    HotelNotFound(String),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("already exists: {0}")]
    Duplicate(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => CatalogError::Duplicate(what),
            other => CatalogError::Store(other),
        }
    }
}

/// Raw listing filters as they arrive from a query string.
#[derive(Debug, Clone, Default)]
pub struct ProductListing {
    pub hotel_slug: Option<String>,
    pub product_type: Option<String>,
    pub search: Option<String>,
    /// Comma-separated keys out of `price`, `name`; `-` prefix for descending.
    pub ordering: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsvImportSummary {
    pub created: usize,
    pub skipped: usize,
}

/// One CSV line. Columns other than these are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CsvProductRow {
    hotel_slug: String,
    name: String,
    sku: Option<String>,
    description: Option<String>,
    price: Option<String>,
    currency: Option<String>,
    product_type: Option<String>,
    category_slug: Option<String>,
    category: Option<String>,
    total_units: Option<u32>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub async fn create_hotel(&self, input: NewHotel) -> Result<Hotel, CatalogError> {
        let hotel = Hotel::create(HotelId::new(), input)?;
        self.store.insert_hotel(&hotel).await?;
        tracing::info!(
            hotel_id = %hotel.id,
            slug = %hotel.slug,
            name = %hotel.display_name(),
            "hotel created"
        );
        Ok(hotel)
    }

    pub async fn list_hotels(&self) -> Result<Vec<Hotel>, CatalogError> {
        Ok(self.store.list_hotels().await?)
    }

    pub async fn get_hotel(&self, id: HotelId) -> Result<Hotel, CatalogError> {
        self.store
            .get_hotel(id)
            .await?
            .ok_or_else(|| CatalogError::HotelNotFound(id.to_string()))
    }

    pub async fn get_hotel_by_slug(&self, slug: &str) -> Result<Hotel, CatalogError> {
        self.store
            .find_hotel_by_slug(slug)
            .await?
            .ok_or_else(|| CatalogError::HotelNotFound(slug.to_string()))
    }

    /// Add `user_id` to the hotel's staff.
    ///
    /// A signed-in user may add themselves to a hotel that has no staff yet and
    /// becomes its manager. After that only a manager may add members.
    pub async fn add_member(
        &self,
        requester: Option<UserId>,
        hotel_id: HotelId,
        user_id: UserId,
        is_manager: bool,
    ) -> Result<HotelMembership, CatalogError> {
        let Some(requester) = requester else {
            return Err(CatalogError::Forbidden("authentication required".to_string()));
        };
        self.get_hotel(hotel_id).await?;

        if requester == user_id {
            let first = HotelMembership {
                user_id,
                hotel_id,
                is_manager: true,
                created_at: Utc::now(),
            };
            if self.store.claim_first_membership(&first).await? {
                tracing::info!(
                    hotel_id = %hotel_id,
                    user_id = %user_id,
                    "first manager claimed hotel"
                );
                return Ok(first);
            }
        }

        let requester_is_manager = self
            .store
            .get_membership(requester, hotel_id)
            .await?
            .is_some_and(|m| m.is_manager);
        if !requester_is_manager {
            return Err(CatalogError::Forbidden(
                "only a hotel manager can add members".to_string(),
            ));
        }

        let membership = HotelMembership {
            user_id,
            hotel_id,
            is_manager,
            created_at: Utc::now(),
        };
        self.store.insert_membership(&membership).await?;
        tracing::info!(hotel_id = %hotel_id, user_id = %user_id, is_manager, "member added");
        Ok(membership)
    }

    pub async fn list_members(&self, hotel_id: HotelId) -> Result<Vec<HotelMembership>, CatalogError> {
        self.get_hotel(hotel_id).await?;
        Ok(self.store.list_members(hotel_id).await?)
    }

    pub async fn create_category(&self, name: &str, slug: &str) -> Result<Category, CatalogError> {
        let category = Category::create(CategoryId::new(), name, slug)?;
        self.store.insert_category(&category).await?;
        Ok(category)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
        Ok(self.store.list_categories().await?)
    }

    pub async fn create_canonical(
        &self,
        name: &str,
        sku: Option<String>,
        normalized_name: Option<String>,
    ) -> Result<CanonicalProduct, CatalogError> {
        let canonical = CanonicalProduct::create(CanonicalId::new(), name, sku, normalized_name)?;
        self.store.insert_canonical(&canonical).await?;
        Ok(canonical)
    }

    pub async fn list_canonicals(&self) -> Result<Vec<CanonicalProduct>, CatalogError> {
        Ok(self.store.list_canonicals().await?)
    }

    /// List a room type or food item. The requester must be staff of the hotel.
    pub async fn create_product(
        &self,
        requester: Option<UserId>,
        input: NewProduct,
    ) -> Result<Product, CatalogError> {
        let hotel = self.get_hotel(input.hotel_id).await?;
        self.require_member(requester, hotel.id).await?;

        let product = Product::create(ProductId::new(), input, Utc::now())?;
        self.store.insert_product(&product).await?;
        tracing::info!(
            product_id = %product.id(),
            hotel_id = %hotel.id,
            product_type = %product.product_type(),
            "product created"
        );
        Ok(product)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.store
            .get_product(id)
            .await?
            .ok_or(CatalogError::ProductNotFound(id))
    }

    /// Non-archived products of one hotel and one type.
    ///
    /// Both the hotel slug and the type are required so room types and food
    /// never show up in the same listing; when either is missing or matches
    /// nothing the result is empty. Unknown ordering keys are ignored.
    pub async fn list_products(
        &self,
        listing: &ProductListing,
    ) -> Result<Vec<Product>, CatalogError> {
        let (Some(slug), Some(raw_type)) = (&listing.hotel_slug, &listing.product_type) else {
            return Ok(vec![]);
        };
        let Ok(product_type) = raw_type.parse::<ProductType>() else {
            return Ok(vec![]);
        };
        let Some(hotel) = self.store.find_hotel_by_slug(slug).await? else {
            return Ok(vec![]);
        };

        let mut query = ProductQuery::new(hotel.id, product_type);
        if let Some(search) = &listing.search {
            query = query.with_search(search);
        }
        if let Some(ordering) = &listing.ordering {
            query = query.with_ordering(ProductOrdering::parse_list(ordering));
        }
        Ok(self.store.list_products(&query).await?)
    }

    /// Create products from CSV text with a header row.
    ///
    /// Rows whose hotel is unknown, whose hotel the requester is not staff of,
    /// or that fail validation are counted as skipped. Categories named by
    /// `category_slug` are created on first use.
    pub async fn import_products_csv(
        &self,
        requester: Option<UserId>,
        data: &[u8],
        default_currency: &str,
    ) -> Result<CsvImportSummary, CatalogError> {
        let Some(requester) = requester else {
            return Err(CatalogError::Forbidden("authentication required".to_string()));
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(data);
        let headers = reader
            .headers()
            .map_err(|e| DomainError::validation(format!("unreadable CSV header: {e}")))?;
        if !headers.iter().any(|h| h == "hotel_slug") {
            return Err(DomainError::validation("CSV needs a hotel_slug column").into());
        }

        let mut summary = CsvImportSummary::default();
        for (index, record) in reader.deserialize::<CsvProductRow>().enumerate() {
            let line = index + 2;
            let row = match record {
                Ok(row) => row,
                Err(err) => {
                    tracing::warn!(line, error = %err, "csv row skipped");
                    summary.skipped += 1;
                    continue;
                }
            };
            match self.import_row(requester, row, default_currency).await {
                Ok(_) => summary.created += 1,
                Err(CatalogError::Store(err)) => return Err(CatalogError::Store(err)),
                Err(err) => {
                    tracing::warn!(line, error = %err, "csv row skipped");
                    summary.skipped += 1;
                }
            }
        }

        tracing::info!(
            requester = %requester,
            created = summary.created,
            skipped = summary.skipped,
            "csv import finished"
        );
        Ok(summary)
    }

    async fn import_row(
        &self,
        requester: UserId,
        row: CsvProductRow,
        default_currency: &str,
    ) -> Result<Product, CatalogError> {
        let hotel = self.get_hotel_by_slug(&row.hotel_slug).await?;
        self.require_member(Some(requester), hotel.id).await?;

        let category_id = match non_blank(row.category_slug) {
            Some(slug) => Some(self.category_for_slug(&slug, non_blank(row.category)).await?.id),
            None => None,
        };
        let price = match non_blank(row.price) {
            Some(raw) => raw
                .parse::<Decimal>()
                .map_err(|e| DomainError::validation(format!("price '{raw}': {e}")))?,
            None => Decimal::ZERO,
        };

        let input = NewProduct {
            hotel_id: hotel.id,
            product_type: non_blank(row.product_type).unwrap_or_else(|| "room".to_string()),
            name: row.name,
            sku: non_blank(row.sku),
            canonical_id: None,
            category_id,
            description: non_blank(row.description),
            price,
            currency: Some(non_blank(row.currency).unwrap_or_else(|| default_currency.to_string())),
            total_units: row.total_units,
            extra_meta: None,
        };
        let product = Product::create(ProductId::new(), input, Utc::now())?;
        self.store.insert_product(&product).await?;
        Ok(product)
    }

    /// Get-or-create by slug; a missing name falls back to the slug.
    async fn category_for_slug(
        &self,
        slug: &str,
        name: Option<String>,
    ) -> Result<Category, CatalogError> {
        if let Some(category) = self.store.find_category_by_slug(slug).await? {
            return Ok(category);
        }
        match self.create_category(name.as_deref().unwrap_or(slug), slug).await {
            // Lost a race against another import creating the same slug.
            Err(CatalogError::Duplicate(_)) => self
                .store
                .find_category_by_slug(slug)
                .await?
                .ok_or_else(|| {
                    CatalogError::Store(StoreError::NotFound(format!("category {slug}")))
                }),
            other => other,
        }
    }

    /// Staff-only; archived products drop out of listings and cannot be booked.
    pub async fn archive_product(
        &self,
        requester: Option<UserId>,
        id: ProductId,
    ) -> Result<Product, CatalogError> {
        let product = self.get_product(id).await?;
        self.require_member(requester, product.hotel_id()).await?;
        let archived = self.store.archive_product(id, Utc::now()).await?;
        tracing::info!(product_id = %id, "product archived");
        Ok(archived)
    }

    /// The same product across hotels, cheapest first. `sku` wins over `name`.
    pub async fn compare(
        &self,
        sku: Option<&str>,
        name: Option<&str>,
    ) -> Result<Vec<Product>, CatalogError> {
        let by = match (sku.filter(|s| !s.trim().is_empty()), name) {
            (Some(sku), _) => ProductMatch::Sku(sku.trim().to_string()),
            (None, Some(name)) if !name.trim().is_empty() => {
                ProductMatch::NormalizedName(normalize_name(name))
            }
            _ => {
                return Err(DomainError::validation("provide ?sku=... or ?name=...").into());
            }
        };
        Ok(self.store.compare_products(&by).await?)
    }

    async fn require_member(
        &self,
        requester: Option<UserId>,
        hotel_id: HotelId,
    ) -> Result<HotelMembership, CatalogError> {
        let Some(user_id) = requester else {
            return Err(CatalogError::Forbidden("authentication required".to_string()));
        };
        self.store
            .get_membership(user_id, hotel_id)
            .await?
            .ok_or_else(|| CatalogError::Forbidden("you are not a member of that hotel".to_string()))
    }
}
