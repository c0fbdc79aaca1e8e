//! Catalog domain module: hotels, staff memberships, categories, canonical
//! products and the products (room types and food items) hotels list.
//!
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod category;
pub mod hotel;
pub mod normalize;
pub mod product;

pub use category::{CanonicalProduct, Category};
pub use hotel::{Hotel, HotelMembership, NewHotel};
pub use normalize::{is_valid_slug, normalize_name};
pub use product::{NewProduct, Product, ProductParts, ProductType};
