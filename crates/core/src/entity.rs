//! Entities: records with identity that outlive changes to their attributes.

/// An identified domain record (hotel, product, booking, ...).
pub trait Entity {
    /// Strongly-typed identifier; all of ours are UUID newtypes, hence `Copy`.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    fn id(&self) -> Self::Id;
}
