//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | PostgreSQL error code | `StoreError` | Scenario |
//! |---|---|---|
//! | `23505` unique violation | `Duplicate` | hotel/category slug, membership, booking id |
//! | `40001` serialization failure | `Conflict` | concurrent transaction won |
//! | `40P01` deadlock detected | `Conflict` | two transactions locked rows in opposite order |
//! | anything else | `Backend` | network errors, pool closed, bad rows |
//!
//! ## Unit counters
//!
//! Reserve is one conditional `UPDATE ... WHERE available_units > 0 RETURNING`,
//! so two transactions can never both take the last unit: the second one waits
//! on the row lock, re-evaluates the predicate and updates nothing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use hotelmenu_bookings::{Booking, BookingStatus, StayDates};
use hotelmenu_catalog::{
    CanonicalProduct, Category, Hotel, HotelMembership, Product, ProductParts,
};
use hotelmenu_core::{BookingId, Entity, HotelId, Money, ProductId, UserId};
use hotelmenu_inventory::RoomInventory;

use super::{
    BookingStore, CatalogStore, ProductMatch, ProductQuery, StoreError, StoreTx, Transactional,
    UnitUpdate,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS hotels (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT NOT NULL,
    address TEXT NOT NULL DEFAULT '',
    city TEXT,
    timezone TEXT NOT NULL DEFAULT 'UTC'
);
CREATE UNIQUE INDEX IF NOT EXISTS hotels_slug_lower ON hotels (lower(slug));

CREATE TABLE IF NOT EXISTS hotel_memberships (
    user_id UUID NOT NULL,
    hotel_id UUID NOT NULL REFERENCES hotels (id) ON DELETE CASCADE,
    is_manager BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (user_id, hotel_id)
);

CREATE TABLE IF NOT EXISTS categories (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS canonical_products (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    sku TEXT,
    normalized_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    id UUID PRIMARY KEY,
    hotel_id UUID NOT NULL REFERENCES hotels (id) ON DELETE CASCADE,
    product_type TEXT NOT NULL,
    name TEXT NOT NULL,
    sku TEXT NOT NULL DEFAULT '',
    normalized_name TEXT NOT NULL,
    canonical_id UUID REFERENCES canonical_products (id) ON DELETE SET NULL,
    category_id UUID REFERENCES categories (id) ON DELETE SET NULL,
    description TEXT NOT NULL DEFAULT '',
    price NUMERIC(10, 2) NOT NULL,
    currency TEXT NOT NULL,
    total_units INTEGER,
    available_units INTEGER,
    is_archived BOOLEAN NOT NULL DEFAULT FALSE,
    extra_meta JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT products_units CHECK (
        (product_type = 'food' AND total_units IS NULL AND available_units IS NULL)
        OR (product_type = 'room' AND available_units >= 0 AND available_units <= total_units)
    )
);
CREATE INDEX IF NOT EXISTS products_hotel_type ON products (hotel_id, product_type);

CREATE TABLE IF NOT EXISTS bookings (
    id UUID PRIMARY KEY,
    product_id UUID NOT NULL REFERENCES products (id) ON DELETE CASCADE,
    requester UUID,
    guest_name TEXT NOT NULL DEFAULT '',
    check_in DATE NOT NULL,
    check_out DATE NOT NULL,
    party_size INTEGER NOT NULL CHECK (party_size >= 1),
    total_price NUMERIC(10, 2) NOT NULL,
    currency TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT bookings_dates CHECK (check_out > check_in)
);
CREATE INDEX IF NOT EXISTS bookings_product_status ON bookings (product_id, status);
"#;

const PRODUCT_COLUMNS: &str = "id, hotel_id, product_type, name, sku, normalized_name, \
     canonical_id, category_id, description, price, currency, total_units, available_units, \
     is_archived, extra_meta, created_at, updated_at";

const BOOKING_COLUMNS: &str = "id, product_id, requester, guest_name, check_in, check_out, \
     party_size, total_price, currency, status, created_at";

/// Postgres-backed catalog and booking store.
///
/// `Send + Sync`; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes that do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    #[instrument(skip(self, hotel), fields(hotel_id = %hotel.id, slug = %hotel.slug), err)]
    async fn insert_hotel(&self, hotel: &Hotel) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO hotels (id, name, slug, address, city, timezone)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(hotel.id.as_uuid())
        .bind(&hotel.name)
        .bind(&hotel.slug)
        .bind(&hotel.address)
        .bind(&hotel.city)
        .bind(&hotel.timezone)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_hotel", e))?;
        Ok(())
    }

    async fn get_hotel(&self, id: HotelId) -> Result<Option<Hotel>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, slug, address, city, timezone FROM hotels WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_hotel", e))?;
        row.as_ref().map(hotel_from_row).transpose()
    }

    async fn find_hotel_by_slug(&self, slug: &str) -> Result<Option<Hotel>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, slug, address, city, timezone FROM hotels WHERE lower(slug) = lower($1)",
        )
        .bind(slug)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_hotel_by_slug", e))?;
        row.as_ref().map(hotel_from_row).transpose()
    }

    async fn list_hotels(&self) -> Result<Vec<Hotel>, StoreError> {
        let rows = sqlx::query("SELECT id, name, slug, address, city, timezone FROM hotels ORDER BY id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_hotels", e))?;
        rows.iter().map(hotel_from_row).collect()
    }

    #[instrument(
        skip(self, membership),
        fields(user_id = %membership.user_id, hotel_id = %membership.hotel_id),
        err
    )]
    async fn insert_membership(&self, membership: &HotelMembership) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO hotel_memberships (user_id, hotel_id, is_manager, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(membership.user_id.as_uuid())
        .bind(membership.hotel_id.as_uuid())
        .bind(membership.is_manager)
        .bind(membership.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_membership", e))?;
        Ok(())
    }

    /// Locks the hotel row so concurrent claims on the same hotel queue up
    /// behind each other; the `NOT EXISTS` check then sees the winner's row.
    #[instrument(
        skip(self, membership),
        fields(user_id = %membership.user_id, hotel_id = %membership.hotel_id),
        err
    )]
    async fn claim_first_membership(
        &self,
        membership: &HotelMembership,
    ) -> Result<bool, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let hotel = sqlx::query("SELECT id FROM hotels WHERE id = $1 FOR UPDATE")
            .bind(membership.hotel_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_hotel", e))?;
        if hotel.is_none() {
            return Err(StoreError::NotFound(format!("hotel {}", membership.hotel_id)));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO hotel_memberships (user_id, hotel_id, is_manager, created_at)
            SELECT $1, $2, $3, $4
            WHERE NOT EXISTS (SELECT 1 FROM hotel_memberships WHERE hotel_id = $2)
            "#,
        )
        .bind(membership.user_id.as_uuid())
        .bind(membership.hotel_id.as_uuid())
        .bind(membership.is_manager)
        .bind(membership.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("claim_first_membership", e))?
        .rows_affected()
            == 1;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(inserted)
    }

    async fn get_membership(
        &self,
        user_id: UserId,
        hotel_id: HotelId,
    ) -> Result<Option<HotelMembership>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, hotel_id, is_manager, created_at
            FROM hotel_memberships
            WHERE user_id = $1 AND hotel_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(hotel_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_membership", e))?;
        row.as_ref().map(membership_from_row).transpose()
    }

    async fn list_members(&self, hotel_id: HotelId) -> Result<Vec<HotelMembership>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, hotel_id, is_manager, created_at
            FROM hotel_memberships
            WHERE hotel_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(hotel_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_members", e))?;
        rows.iter().map(membership_from_row).collect()
    }

    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO categories (id, name, slug) VALUES ($1, $2, $3)")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .bind(&category.slug)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query("SELECT id, name, slug FROM categories ORDER BY id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_categories", e))?;
        rows.iter().map(category_from_row).collect()
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query("SELECT id, name, slug FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_category_by_slug", e))?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn insert_canonical(&self, canonical: &CanonicalProduct) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO canonical_products (id, name, sku, normalized_name) VALUES ($1, $2, $3, $4)",
        )
        .bind(canonical.id.as_uuid())
        .bind(&canonical.name)
        .bind(&canonical.sku)
        .bind(&canonical.normalized_name)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_canonical", e))?;
        Ok(())
    }

    async fn list_canonicals(&self) -> Result<Vec<CanonicalProduct>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, sku, normalized_name FROM canonical_products ORDER BY id",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_canonicals", e))?;
        rows.iter()
            .map(|row| {
                Ok(CanonicalProduct {
                    id: get::<Uuid>(row, "id")?.into(),
                    name: get(row, "name")?,
                    sku: get(row, "sku")?,
                    normalized_name: get(row, "normalized_name")?,
                })
            })
            .collect()
    }

    #[instrument(
        skip(self, product),
        fields(product_id = %product.id(), hotel_id = %product.hotel_id()),
        err
    )]
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let p = product.parts();
        let (total, available) = match p.inventory {
            Some(inv) => (
                Some(to_i32(inv.total_units())?),
                Some(to_i32(inv.available_units())?),
            ),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO products (
                id, hotel_id, product_type, name, sku, normalized_name,
                canonical_id, category_id, description, price, currency,
                total_units, available_units, is_archived, extra_meta,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(p.id.as_uuid())
        .bind(p.hotel_id.as_uuid())
        .bind(p.product_type.as_str())
        .bind(&p.name)
        .bind(&p.sku)
        .bind(&p.normalized_name)
        .bind(p.canonical_id.map(|c| c.as_uuid()))
        .bind(p.category_id.map(|c| c.as_uuid()))
        .bind(&p.description)
        .bind(p.price.amount())
        .bind(p.price.currency())
        .bind(total)
        .bind(available)
        .bind(p.is_archived)
        .bind(&p.extra_meta)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, StoreError> {
        let mut sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE hotel_id = $1 AND product_type = $2 AND NOT is_archived"
        );
        for n in 3..3 + query.search_terms.len() {
            sql.push_str(&format!(
                " AND (name ILIKE ${n} OR description ILIKE ${n} \
                 OR normalized_name ILIKE ${n} OR sku ILIKE ${n})"
            ));
        }
        let order: Vec<&str> = query
            .ordering
            .iter()
            .map(|key| key.as_sql())
            .chain(["id ASC"])
            .collect();
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));

        let mut q = sqlx::query(&sql)
            .bind(query.hotel_id.as_uuid())
            .bind(query.product_type.as_str());
        for term in &query.search_terms {
            q = q.bind(format!("%{}%", escape_like(term)));
        }
        let rows = q
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    async fn compare_products(&self, by: &ProductMatch) -> Result<Vec<Product>, StoreError> {
        let (predicate, value) = match by {
            ProductMatch::Sku(sku) => ("sku <> '' AND lower(sku) = lower($1)", sku),
            ProductMatch::NormalizedName(name) => ("normalized_name = $1", name),
        };
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE NOT is_archived AND {predicate} \
             ORDER BY price ASC, id ASC"
        ))
        .bind(value)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("compare_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn archive_product(
        &self,
        id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE products SET is_archived = TRUE, updated_at = $2 \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(now)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("archive_product", e))?;
        match row {
            Some(row) => product_from_row(&row),
            None => Err(StoreError::NotFound(format!("product {id}"))),
        }
    }
}

#[async_trait]
impl BookingStore for PostgresStore {
    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_booking", e))?;
        row.as_ref().map(booking_from_row).transpose()
    }

    #[instrument(
        skip(self, statuses),
        fields(product_id = %product_id, booking_count = tracing::field::Empty),
        err
    )]
    async fn query_bookings(
        &self,
        product_id: ProductId,
        statuses: &[BookingStatus],
    ) -> Result<Vec<Booking>, StoreError> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE product_id = $1 AND status = ANY($2) \
             ORDER BY check_in ASC"
        ))
        .bind(product_id.as_uuid())
        .bind(&statuses)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_bookings", e))?;

        Span::current().record("booking_count", rows.len());
        rows.iter().map(booking_from_row).collect()
    }

    async fn list_visible_bookings(&self, user_id: UserId) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.product_id, b.requester, b.guest_name, b.check_in, b.check_out,
                   b.party_size, b.total_price, b.currency, b.status, b.created_at
            FROM bookings b
            JOIN products p ON p.id = b.product_id
            WHERE b.requester = $1
               OR EXISTS (
                   SELECT 1 FROM hotel_memberships m
                   WHERE m.hotel_id = p.hotel_id AND m.user_id = $1
               )
            ORDER BY b.created_at DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_visible_bookings", e))?;
        rows.iter().map(booking_from_row).collect()
    }
}

#[async_trait]
impl Transactional for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTx { tx }))
    }
}

/// An open Postgres transaction. Dropping it rolls back.
struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTx {
    async fn units_of(&mut self, id: ProductId) -> Result<Option<Option<RoomInventory>>, StoreError> {
        let row = sqlx::query("SELECT total_units, available_units FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("units_of", e))?;
        row.as_ref().map(inventory_from_row).transpose()
    }
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("tx_get_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn reserve_unit(&mut self, id: ProductId) -> Result<UnitUpdate, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE products
            SET available_units = available_units - 1, updated_at = NOW()
            WHERE id = $1 AND product_type = 'room' AND available_units > 0
            RETURNING total_units, available_units
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("reserve_unit", e))?;

        if let Some(row) = row {
            return match inventory_from_row(&row)? {
                Some(inv) => Ok(UnitUpdate::Applied(inv)),
                None => Err(StoreError::Backend(format!("room product {id} lost its counter"))),
            };
        }

        // Nothing updated: tell apart a missing product, food, and a sold-out room.
        match self.units_of(id).await? {
            None => Err(StoreError::NotFound(format!("product {id}"))),
            Some(None) => Ok(UnitUpdate::NotTracked),
            Some(Some(_)) => Ok(UnitUpdate::Exhausted),
        }
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn release_unit(&mut self, id: ProductId) -> Result<UnitUpdate, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE products
            SET available_units = LEAST(available_units + 1, total_units), updated_at = NOW()
            WHERE id = $1 AND product_type = 'room'
            RETURNING total_units, available_units
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("release_unit", e))?;

        match row {
            Some(row) => match inventory_from_row(&row)? {
                Some(inv) => Ok(UnitUpdate::Applied(inv)),
                None => Err(StoreError::Backend(format!("room product {id} lost its counter"))),
            },
            None => match self.units_of(id).await? {
                None => Err(StoreError::NotFound(format!("product {id}"))),
                Some(_) => Ok(UnitUpdate::NotTracked),
            },
        }
    }

    async fn count_overlapping(
        &mut self,
        product_id: ProductId,
        stay: &StayDates,
    ) -> Result<usize, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS overlapping
            FROM bookings
            WHERE product_id = $1
              AND status IN ('pending', 'confirmed')
              AND check_in < $3
              AND $2 < check_out
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(stay.check_in())
        .bind(stay.check_out())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("count_overlapping", e))?;
        let count: i64 = get(&row, "overlapping")?;
        usize::try_from(count).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn lock_booking(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_booking", e))?;
        row.as_ref().map(booking_from_row).transpose()
    }

    #[instrument(skip(self, booking), fields(booking_id = %booking.id, product_id = %booking.product_id), err)]
    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, product_id, requester, guest_name, check_in, check_out,
                party_size, total_price, currency, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(booking.id.as_uuid())
        .bind(booking.product_id.as_uuid())
        .bind(booking.requester.map(|u| u.as_uuid()))
        .bind(&booking.guest_name)
        .bind(booking.stay.check_in())
        .bind(booking.stay.check_out())
        .bind(to_i32(booking.party_size)?)
        .bind(booking.total_price.amount())
        .bind(booking.total_price.currency())
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_booking", e))?;
        Ok(())
    }

    async fn set_booking_status(
        &mut self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE bookings SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_booking_status", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("booking {id}")));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PostgresTx { tx } = *self;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("failed to read column {column}: {e}")))
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn to_i32(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Backend(format!("{value} does not fit in INTEGER")))
}

fn to_u32(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Backend(format!("negative {column}: {value}")))
}

fn hotel_from_row(row: &PgRow) -> Result<Hotel, StoreError> {
    Ok(Hotel {
        id: get::<Uuid>(row, "id")?.into(),
        name: get(row, "name")?,
        slug: get(row, "slug")?,
        address: get(row, "address")?,
        city: get(row, "city")?,
        timezone: get(row, "timezone")?,
    })
}

fn category_from_row(row: &PgRow) -> Result<Category, StoreError> {
    Ok(Category {
        id: get::<Uuid>(row, "id")?.into(),
        name: get(row, "name")?,
        slug: get(row, "slug")?,
    })
}

fn membership_from_row(row: &PgRow) -> Result<HotelMembership, StoreError> {
    Ok(HotelMembership {
        user_id: get::<Uuid>(row, "user_id")?.into(),
        hotel_id: get::<Uuid>(row, "hotel_id")?.into(),
        is_manager: get(row, "is_manager")?,
        created_at: get(row, "created_at")?,
    })
}

/// `None` for food, `Some(counter)` for rooms.
fn inventory_from_row(row: &PgRow) -> Result<Option<RoomInventory>, StoreError> {
    let total: Option<i32> = get(row, "total_units")?;
    let available: Option<i32> = get(row, "available_units")?;
    match (total, available) {
        (Some(total), Some(available)) => {
            RoomInventory::new(to_u32(total, "total_units")?, to_u32(available, "available_units")?)
                .map(Some)
                .map_err(|e| StoreError::Backend(e.to_string()))
        }
        (None, None) => Ok(None),
        _ => Err(StoreError::Backend(
            "total_units and available_units must both be set or both be NULL".to_string(),
        )),
    }
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let product_type: String = get(row, "product_type")?;
    let price: Decimal = get(row, "price")?;
    let currency: String = get(row, "currency")?;

    let parts = ProductParts {
        id: get::<Uuid>(row, "id")?.into(),
        hotel_id: get::<Uuid>(row, "hotel_id")?.into(),
        product_type: product_type
            .parse()
            .map_err(|e: hotelmenu_core::DomainError| StoreError::Backend(e.to_string()))?,
        name: get(row, "name")?,
        sku: get(row, "sku")?,
        normalized_name: get(row, "normalized_name")?,
        canonical_id: get::<Option<Uuid>>(row, "canonical_id")?.map(Into::into),
        category_id: get::<Option<Uuid>>(row, "category_id")?.map(Into::into),
        description: get(row, "description")?,
        price: Money::new(price, currency).map_err(|e| StoreError::Backend(e.to_string()))?,
        inventory: inventory_from_row(row)?,
        is_archived: get(row, "is_archived")?,
        extra_meta: get(row, "extra_meta")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    };
    Product::restore(parts).map_err(|e| StoreError::Backend(e.to_string()))
}

fn booking_from_row(row: &PgRow) -> Result<Booking, StoreError> {
    let check_in: NaiveDate = get(row, "check_in")?;
    let check_out: NaiveDate = get(row, "check_out")?;
    let status: String = get(row, "status")?;
    let total: Decimal = get(row, "total_price")?;
    let currency: String = get(row, "currency")?;
    let party_size: i32 = get(row, "party_size")?;

    Ok(Booking {
        id: get::<Uuid>(row, "id")?.into(),
        product_id: get::<Uuid>(row, "product_id")?.into(),
        requester: get::<Option<Uuid>>(row, "requester")?.map(Into::into),
        guest_name: get(row, "guest_name")?,
        stay: StayDates::new(check_in, check_out).map_err(|e| StoreError::Backend(e.to_string()))?,
        party_size: to_u32(party_size, "party_size")?,
        total_price: Money::new(total, currency).map_err(|e| StoreError::Backend(e.to_string()))?,
        status: BookingStatus::parse(&status)
            .ok_or_else(|| StoreError::Backend(format!("unknown booking status '{status}'")))?,
        created_at: get(row, "created_at")?,
    })
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(msg),
                Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
