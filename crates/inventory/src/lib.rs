//! Room inventory domain module.
//!
//! Business rules for the per-room-type unit counter, implemented purely as
//! deterministic state transitions (no IO, no HTTP, no storage). Storage adapters
//! apply these transitions atomically.

pub mod room;

pub use room::{InventoryError, RoomInventory};
