use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hotelmenu_core::{
    CanonicalId, CategoryId, DomainError, DomainResult, Entity, HotelId, Money, ProductId,
    DEFAULT_CURRENCY,
};
use hotelmenu_inventory::RoomInventory;

use crate::normalize::normalize_name;

/// What a product is: a bookable room type or a food item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Room,
    Food,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Room => "room",
            ProductType::Food => "food",
        }
    }
}

impl FromStr for ProductType {
    type Err = DomainError;

    /// Accepts the spellings clients historically sent ("rooms", "room type",
    /// "meals", ...), case-insensitively.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "room" | "rooms" | "room-type" | "room_types" | "room type" => Ok(ProductType::Room),
            "food" | "foods" | "meal" | "meals" => Ok(ProductType::Food),
            other => Err(DomainError::validation(format!(
                "unknown product type '{other}' (expected room or food)"
            ))),
        }
    }
}

impl core::fmt::Display for ProductType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for listing a new product.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewProduct {
    pub hotel_id: HotelId,
    pub product_type: String,
    pub name: String,
    pub sku: Option<String>,
    pub canonical_id: Option<CanonicalId>,
    pub category_id: Option<CategoryId>,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: Option<String>,
    /// Number of rooms of this type. Ignored for food; defaults to 1 for rooms.
    pub total_units: Option<u32>,
    pub extra_meta: Option<serde_json::Value>,
}

/// Every stored attribute of a product, used by storage adapters to rebuild one.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductParts {
    pub id: ProductId,
    pub hotel_id: HotelId,
    pub product_type: ProductType,
    pub name: String,
    pub sku: String,
    pub normalized_name: String,
    pub canonical_id: Option<CanonicalId>,
    pub category_id: Option<CategoryId>,
    pub description: String,
    pub price: Money,
    pub inventory: Option<RoomInventory>,
    pub is_archived: bool,
    pub extra_meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A listed room type or food item.
///
/// Room products always carry a [`RoomInventory`]; food products never do.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    parts: ProductParts,
}

impl Product {
    pub fn create(id: ProductId, input: NewProduct, now: DateTime<Utc>) -> DomainResult<Self> {
        let product_type: ProductType = input.product_type.parse()?;

        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if name.chars().count() > 255 {
            return Err(DomainError::validation("name is longer than 255 characters"));
        }

        let sku = input.sku.unwrap_or_default().trim().to_string();
        if sku.chars().count() > 100 {
            return Err(DomainError::validation("sku is longer than 100 characters"));
        }

        let price = Money::new(
            input.price,
            input.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        )?;

        let inventory = match product_type {
            ProductType::Room => Some(RoomInventory::fully_available(input.total_units.unwrap_or(1))),
            ProductType::Food => None,
        };

        let extra_meta = match input.extra_meta {
            None | Some(serde_json::Value::Null) => serde_json::Value::Object(Default::default()),
            Some(v @ serde_json::Value::Object(_)) => v,
            Some(_) => return Err(DomainError::validation("extra_meta must be a JSON object")),
        };

        Ok(Self {
            parts: ProductParts {
                id,
                hotel_id: input.hotel_id,
                product_type,
                normalized_name: normalize_name(&name),
                name,
                sku,
                canonical_id: input.canonical_id,
                category_id: input.category_id,
                description: input.description.unwrap_or_default(),
                price,
                inventory,
                is_archived: false,
                extra_meta,
                created_at: now,
                updated_at: now,
            },
        })
    }

    /// Rebuild from storage, checking that the inventory matches the type.
    pub fn restore(parts: ProductParts) -> DomainResult<Self> {
        match (parts.product_type, parts.inventory) {
            (ProductType::Room, None) => Err(DomainError::invariant(format!(
                "room product {} has no inventory",
                parts.id
            ))),
            (ProductType::Food, Some(_)) => Err(DomainError::invariant(format!(
                "food product {} carries inventory",
                parts.id
            ))),
            _ => Ok(Self { parts }),
        }
    }

    pub fn parts(&self) -> &ProductParts {
        &self.parts
    }

    pub fn hotel_id(&self) -> HotelId {
        self.parts.hotel_id
    }

    pub fn product_type(&self) -> ProductType {
        self.parts.product_type
    }

    pub fn name(&self) -> &str {
        &self.parts.name
    }

    pub fn sku(&self) -> &str {
        &self.parts.sku
    }

    pub fn normalized_name(&self) -> &str {
        &self.parts.normalized_name
    }

    pub fn description(&self) -> &str {
        &self.parts.description
    }

    pub fn price(&self) -> &Money {
        &self.parts.price
    }

    pub fn inventory(&self) -> Option<RoomInventory> {
        self.parts.inventory
    }

    pub fn is_archived(&self) -> bool {
        self.parts.is_archived
    }

    /// Food is always orderable; rooms only while a unit is free.
    pub fn is_available(&self) -> bool {
        self.parts.inventory.map_or(true, |inv| inv.is_bookable())
    }

    /// Nightly rate of a room type; `None` for food.
    pub fn nightly_rate(&self) -> Option<&Money> {
        match self.parts.product_type {
            ProductType::Room => Some(&self.parts.price),
            ProductType::Food => None,
        }
    }

    /// Replace the unit counter of a room product. Food products are returned
    /// unchanged.
    pub fn with_inventory(&self, inventory: RoomInventory, now: DateTime<Utc>) -> Self {
        if self.parts.product_type == ProductType::Food {
            return self.clone();
        }
        let mut next = self.clone();
        next.parts.inventory = Some(inventory);
        next.parts.updated_at = now;
        next
    }

    pub fn archive(&mut self, now: DateTime<Utc>) {
        self.parts.is_archived = true;
        self.parts.updated_at = now;
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.parts.id
    }
}
