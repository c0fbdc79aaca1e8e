use serde::{Deserialize, Serialize};
use thiserror::Error;

use hotelmenu_core::DomainError;

/// Why an inventory transition was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InventoryError {
    #[error("available units ({available}) exceed total units ({total})")]
    AvailableExceedsTotal { total: u32, available: u32 },

    #[error("no units available")]
    Exhausted,
}

impl From<InventoryError> for DomainError {
    fn from(value: InventoryError) -> Self {
        match value {
            InventoryError::AvailableExceedsTotal { .. } => DomainError::invariant(value.to_string()),
            InventoryError::Exhausted => DomainError::conflict(value.to_string()),
        }
    }
}

/// Unit counter of a room type: how many interchangeable rooms exist and how many
/// are still free.
///
/// Invariant: `available_units <= total_units`. Every constructor and transition
/// preserves it; the fields are private so nothing else can break it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRoomInventory", into = "RawRoomInventory")]
pub struct RoomInventory {
    total_units: u32,
    available_units: u32,
}

#[derive(Serialize, Deserialize)]
struct RawRoomInventory {
    total_units: u32,
    available_units: u32,
}

impl TryFrom<RawRoomInventory> for RoomInventory {
    type Error = InventoryError;

    fn try_from(raw: RawRoomInventory) -> Result<Self, Self::Error> {
        Self::new(raw.total_units, raw.available_units)
    }
}

impl From<RoomInventory> for RawRoomInventory {
    fn from(value: RoomInventory) -> Self {
        Self {
            total_units: value.total_units,
            available_units: value.available_units,
        }
    }
}

impl RoomInventory {
    pub fn new(total_units: u32, available_units: u32) -> Result<Self, InventoryError> {
        if available_units > total_units {
            return Err(InventoryError::AvailableExceedsTotal {
                total: total_units,
                available: available_units,
            });
        }
        Ok(Self {
            total_units,
            available_units,
        })
    }

    /// A freshly listed room type: every unit is free.
    pub fn fully_available(total_units: u32) -> Self {
        Self {
            total_units,
            available_units: total_units,
        }
    }

    pub fn total_units(&self) -> u32 {
        self.total_units
    }

    pub fn available_units(&self) -> u32 {
        self.available_units
    }

    /// Derived flag: at least one unit is free.
    pub fn is_bookable(&self) -> bool {
        self.available_units > 0
    }

    /// Take one unit. Fails when none are left; `self` is never modified.
    pub fn reserve(&self) -> Result<Self, InventoryError> {
        match self.available_units.checked_sub(1) {
            Some(available_units) => Ok(Self {
                total_units: self.total_units,
                available_units,
            }),
            None => Err(InventoryError::Exhausted),
        }
    }

    /// Give one unit back, capped at `total_units`.
    pub fn release(&self) -> Self {
        Self {
            total_units: self.total_units,
            available_units: (self.available_units + 1).min(self.total_units),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_available_above_total() {
        let err = RoomInventory::new(1, 2).unwrap_err();
        assert_eq!(
            err,
            InventoryError::AvailableExceedsTotal {
                total: 1,
                available: 2
            }
        );
    }

    #[test]
    fn reserving_last_unit_flips_bookable() {
        let inv = RoomInventory::new(1, 1).unwrap();
        assert!(inv.is_bookable());

        let after = inv.reserve().unwrap();
        assert_eq!(after.available_units(), 0);
        assert!(!after.is_bookable());
    }

    #[test]
    fn reserve_on_exhausted_inventory_fails() {
        let inv = RoomInventory::new(3, 0).unwrap();
        assert_eq!(inv.reserve().unwrap_err(), InventoryError::Exhausted);
    }

    #[test]
    fn release_restores_bookability() {
        let inv = RoomInventory::new(2, 0).unwrap();
        let after = inv.release();
        assert_eq!(after.available_units(), 1);
        assert!(after.is_bookable());
    }

    #[test]
    fn release_is_capped_at_total() {
        let inv = RoomInventory::fully_available(2);
        assert_eq!(inv.release(), inv);
    }

    #[test]
    fn deserialize_enforces_invariant() {
        let err = serde_json::from_str::<RoomInventory>(r#"{"total_units":1,"available_units":5}"#);
        assert!(err.is_err());

        let ok: RoomInventory =
            serde_json::from_str(r#"{"total_units":5,"available_units":1}"#).unwrap();
        assert_eq!(ok.available_units(), 1);
    }

    #[test]
    fn exhausted_maps_to_domain_conflict() {
        let err: DomainError = InventoryError::Exhausted.into();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: no sequence of reserve/release breaks 0 <= available <= total,
            /// and reserve succeeds exactly when a unit is free.
            #[test]
            fn transitions_preserve_bounds(
                total in 0u32..20,
                ops in proptest::collection::vec(any::<bool>(), 0..100)
            ) {
                let mut inv = RoomInventory::fully_available(total);
                for reserve in ops {
                    if reserve {
                        match inv.reserve() {
                            Ok(next) => {
                                prop_assert_eq!(next.available_units() + 1, inv.available_units());
                                inv = next;
                            }
                            Err(e) => {
                                prop_assert_eq!(e, InventoryError::Exhausted);
                                prop_assert_eq!(inv.available_units(), 0);
                            }
                        }
                    } else {
                        inv = inv.release();
                    }
                    prop_assert!(inv.available_units() <= inv.total_units());
                    prop_assert_eq!(inv.is_bookable(), inv.available_units() > 0);
                }
            }
        }
    }
}
