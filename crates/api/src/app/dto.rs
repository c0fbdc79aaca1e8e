use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use hotelmenu_bookings::Booking;
use hotelmenu_catalog::{CanonicalProduct, Category, Hotel, HotelMembership, NewProduct, Product};
use hotelmenu_core::{CanonicalId, CategoryId, Entity, HotelId};
use hotelmenu_infra::{CsvImportSummary, ProductListing};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: String,
    #[serde(default)]
    pub is_manager: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCanonicalRequest {
    pub name: String,
    pub sku: Option<String>,
    pub normalized_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub hotel_id: String,
    pub product_type: String,
    pub name: String,
    pub sku: Option<String>,
    pub canonical_id: Option<String>,
    pub category_id: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: Option<String>,
    pub total_units: Option<u32>,
    pub extra_meta: Option<serde_json::Value>,
}

impl CreateProductRequest {
    /// Resolve ids and fill in the configured currency when none was sent.
    pub fn into_new_product(
        self,
        default_currency: &str,
    ) -> Result<NewProduct, axum::response::Response> {
        let hotel_id: HotelId = self.hotel_id.parse().map_err(|_| errors::invalid_id("hotel"))?;
        let canonical_id = self
            .canonical_id
            .map(|raw| raw.parse::<CanonicalId>())
            .transpose()
            .map_err(|_| errors::invalid_id("canonical"))?;
        let category_id = self
            .category_id
            .map(|raw| raw.parse::<CategoryId>())
            .transpose()
            .map_err(|_| errors::invalid_id("category"))?;

        Ok(NewProduct {
            hotel_id,
            product_type: self.product_type,
            name: self.name,
            sku: self.sku,
            canonical_id,
            category_id,
            description: self.description,
            price: self.price,
            currency: Some(
                self.currency
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| default_currency.to_string()),
            ),
            total_units: self.total_units,
            extra_meta: self.extra_meta,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub product_id: String,
    pub check_in: String,  // YYYY-MM-DD
    pub check_out: String, // YYYY-MM-DD
    pub party_size: Option<u32>,
    pub guest_name: Option<String>,
}

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub hotel: Option<String>,
    /// Alias of `hotel`.
    pub hotel_slug: Option<String>,
    pub product_type: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl ProductListQuery {
    pub fn into_listing(self) -> ProductListing {
        ProductListing {
            hotel_slug: self.hotel.or(self.hotel_slug),
            product_type: self.product_type,
            search: self.search,
            ordering: self.ordering,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CompareQuery {
    pub sku: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub product: Option<String>,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
}

pub fn parse_date(field: &str, raw: Option<&str>) -> Result<NaiveDate, axum::response::Response> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Err(errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "missing_parameter",
            format!("{field} is required"),
        ));
    };
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_date",
            format!("{field} must be a date formatted YYYY-MM-DD"),
        )
    })
}

// -------------------------
// JSON mapping
// -------------------------

pub fn hotel_to_json(hotel: &Hotel) -> serde_json::Value {
    json!({
        "id": hotel.id.to_string(),
        "name": hotel.name,
        "slug": hotel.slug,
        "address": hotel.address,
        "city": hotel.city,
        "timezone": hotel.timezone,
    })
}

pub fn membership_to_json(m: &HotelMembership) -> serde_json::Value {
    json!({
        "user_id": m.user_id.to_string(),
        "hotel_id": m.hotel_id.to_string(),
        "is_manager": m.is_manager,
        "created_at": m.created_at.to_rfc3339(),
    })
}

pub fn category_to_json(c: &Category) -> serde_json::Value {
    json!({
        "id": c.id.to_string(),
        "name": c.name,
        "slug": c.slug,
    })
}

pub fn canonical_to_json(c: &CanonicalProduct) -> serde_json::Value {
    json!({
        "id": c.id.to_string(),
        "name": c.name,
        "sku": c.sku,
        "normalized_name": c.normalized_name,
    })
}

pub fn csv_import_to_json(summary: &CsvImportSummary) -> serde_json::Value {
    json!({ "created": summary.created, "skipped": summary.skipped })
}

pub fn product_to_json(p: &Product) -> serde_json::Value {
    let parts = p.parts();
    let mut body = json!({
        "id": p.id().to_string(),
        "hotel_id": parts.hotel_id.to_string(),
        "product_type": parts.product_type.as_str(),
        "name": parts.name,
        "sku": parts.sku,
        "normalized_name": parts.normalized_name,
        "canonical_id": parts.canonical_id.map(|id| id.to_string()),
        "category_id": parts.category_id.map(|id| id.to_string()),
        "description": parts.description,
        "price": parts.price.amount().to_string(),
        "currency": parts.price.currency(),
        "is_available": p.is_available(),
        "is_archived": parts.is_archived,
        "extra_meta": parts.extra_meta,
        "created_at": parts.created_at.to_rfc3339(),
        "updated_at": parts.updated_at.to_rfc3339(),
    });
    if let (Some(inv), Some(obj)) = (parts.inventory, body.as_object_mut()) {
        obj.insert("total_units".to_string(), json!(inv.total_units()));
        obj.insert("available_units".to_string(), json!(inv.available_units()));
    }
    body
}

pub fn booking_to_json(b: &Booking) -> serde_json::Value {
    json!({
        "id": b.id.to_string(),
        "product_id": b.product_id.to_string(),
        "requester": b.requester.map(|id| id.to_string()),
        "guest_name": b.guest_name,
        "check_in": b.stay.check_in().to_string(),
        "check_out": b.stay.check_out().to_string(),
        "nights": b.stay.nights(),
        "party_size": b.party_size,
        "total_price": b.total_price.amount().to_string(),
        "currency": b.total_price.currency(),
        "status": b.status.as_str(),
        "created_at": b.created_at.to_rfc3339(),
    })
}
