//! Inventory Ledger: the only writer of room unit counters.

use std::sync::Arc;

use thiserror::Error;

use hotelmenu_core::ProductId;
use hotelmenu_inventory::RoomInventory;

use crate::store::{StoreError, StoreTx, Transactional, UnitUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    Reserved(RoomInventory),
    Released(RoomInventory),
    /// Food products have no unit counter; nothing changed.
    NotTracked,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("no units available for product {0}")]
    Exhausted(ProductId),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        LedgerError::Store(err)
    }
}

#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn Transactional>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn Transactional>) -> Self {
        Self { store }
    }

    /// Take one unit inside the caller's transaction.
    ///
    /// On `Exhausted` nothing was written; the caller decides whether to abort.
    pub async fn reserve_unit_in(
        tx: &mut dyn StoreTx,
        product_id: ProductId,
    ) -> Result<LedgerOutcome, LedgerError> {
        match tx.reserve_unit(product_id).await {
            Ok(UnitUpdate::Applied(inventory)) => {
                tracing::debug!(
                    product_id = %product_id,
                    available_units = inventory.available_units(),
                    "reserved unit"
                );
                Ok(LedgerOutcome::Reserved(inventory))
            }
            Ok(UnitUpdate::Exhausted) => Err(LedgerError::Exhausted(product_id)),
            Ok(UnitUpdate::NotTracked) => Ok(LedgerOutcome::NotTracked),
            Err(StoreError::NotFound(_)) => Err(LedgerError::ProductNotFound(product_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Give one unit back inside the caller's transaction. Capped at the total.
    pub async fn release_unit_in(
        tx: &mut dyn StoreTx,
        product_id: ProductId,
    ) -> Result<LedgerOutcome, LedgerError> {
        match tx.release_unit(product_id).await {
            Ok(UnitUpdate::Applied(inventory)) => {
                tracing::debug!(
                    product_id = %product_id,
                    available_units = inventory.available_units(),
                    "released unit"
                );
                Ok(LedgerOutcome::Released(inventory))
            }
            Ok(UnitUpdate::Exhausted) | Ok(UnitUpdate::NotTracked) => Ok(LedgerOutcome::NotTracked),
            Err(StoreError::NotFound(_)) => Err(LedgerError::ProductNotFound(product_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Standalone reserve in its own transaction.
    pub async fn reserve_unit(&self, product_id: ProductId) -> Result<LedgerOutcome, LedgerError> {
        let mut tx = self.store.begin().await?;
        let outcome = Self::reserve_unit_in(&mut *tx, product_id).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Standalone release in its own transaction.
    pub async fn release_unit(&self, product_id: ProductId) -> Result<LedgerOutcome, LedgerError> {
        let mut tx = self.store.begin().await?;
        let outcome = Self::release_unit_in(&mut *tx, product_id).await?;
        tx.commit().await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CatalogStore, InMemoryStore};
    use chrono::Utc;
    use hotelmenu_catalog::{Hotel, NewHotel, NewProduct, Product};
    use hotelmenu_core::{Entity, HotelId};
    use rust_decimal::Decimal;

    async fn seed(store: &InMemoryStore, product_type: &str, units: u32) -> ProductId {
        let hotel = Hotel::create(
            HotelId::new(),
            NewHotel {
                name: "Ledger Hotel".to_string(),
                slug: format!("ledger-{}", HotelId::new()),
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
                product_type: product_type.to_string(),
                name: "Twin Room".to_string(),
                sku: None,
                canonical_id: None,
                category_id: None,
                description: None,
                price: Decimal::from(80),
                currency: None,
                total_units: Some(units),
                extra_meta: None,
            },
            Utc::now(),
        )
        .unwrap();
        store.insert_product(&product).await.unwrap();
        product.id()
    }

    #[tokio::test]
    async fn reserve_until_exhausted_then_release() {
        let store = InMemoryStore::new();
        let id = seed(&store, "room", 2).await;
        let ledger = InventoryLedger::new(Arc::new(store.clone()));

        assert!(matches!(
            ledger.reserve_unit(id).await.unwrap(),
            LedgerOutcome::Reserved(inv) if inv.available_units() == 1
        ));
        assert!(matches!(ledger.reserve_unit(id).await.unwrap(), LedgerOutcome::Reserved(_)));
        assert_eq!(ledger.reserve_unit(id).await.unwrap_err(), LedgerError::Exhausted(id));

        let product = store.get_product(id).await.unwrap().unwrap();
        assert_eq!(product.inventory().unwrap().available_units(), 0);
        assert!(!product.is_available());

        assert!(matches!(
            ledger.release_unit(id).await.unwrap(),
            LedgerOutcome::Released(inv) if inv.available_units() == 1 && inv.is_bookable()
        ));
    }

    #[tokio::test]
    async fn release_is_capped_at_total() {
        let store = InMemoryStore::new();
        let id = seed(&store, "room", 1).await;
        let ledger = InventoryLedger::new(Arc::new(store.clone()));

        let outcome = ledger.release_unit(id).await.unwrap();
        assert!(matches!(outcome, LedgerOutcome::Released(inv) if inv.available_units() == 1));
    }

    #[tokio::test]
    async fn food_is_not_tracked() {
        let store = InMemoryStore::new();
        let id = seed(&store, "food", 1).await;
        let ledger = InventoryLedger::new(Arc::new(store.clone()));

        assert_eq!(ledger.reserve_unit(id).await.unwrap(), LedgerOutcome::NotTracked);
        assert_eq!(ledger.release_unit(id).await.unwrap(), LedgerOutcome::NotTracked);
        let product = store.get_product(id).await.unwrap().unwrap();
        assert_eq!(product.inventory(), None);
    }

    #[tokio::test]
    async fn unknown_product_is_reported() {
        let ledger = InventoryLedger::new(Arc::new(InMemoryStore::new()));
        let id = ProductId::new();
        assert_eq!(
            ledger.reserve_unit(id).await.unwrap_err(),
            LedgerError::ProductNotFound(id)
        );
    }
}
