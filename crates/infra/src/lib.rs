//! Infrastructure layer: storage adapters and the services that run domain
//! operations inside store transactions.

pub mod availability;
pub mod catalog;
pub mod ledger;
pub mod lifecycle;
pub mod store;

pub use availability::AvailabilityOracle;
pub use catalog::{CatalogError, CatalogService, CsvImportSummary, ProductListing};
pub use ledger::{InventoryLedger, LedgerError, LedgerOutcome};
pub use lifecycle::{AdmissionPolicy, BookingError, BookingLifecycle, BookingRequest};
pub use store::{
    BookingStore, CatalogStore, InMemoryStore, ProductMatch, ProductOrdering, ProductQuery,
    StoreError, StoreTx, Transactional, UnitUpdate,
};

#[cfg(test)]
mod integration_tests;
