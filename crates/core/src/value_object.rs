//! Value objects: equality by value, not identity.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. To "modify"
/// one, build a new value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Currency used when a product does not specify one.
pub const DEFAULT_CURRENCY: &str = "KES";

/// A decimal amount in a named currency.
///
/// Amounts are kept at two decimal places and ten significant digits (the
/// storage precision of prices), and are never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: String,
}

impl ValueObject for Money {}

impl Money {
    /// Largest amount a price or booking total may hold: 99,999,999.99.
    pub fn max_amount() -> Decimal {
        Decimal::new(9_999_999_999, 2)
    }

    pub fn new(amount: Decimal, currency: impl Into<String>) -> DomainResult<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::validation("amount cannot be negative"));
        }
        let currency = currency.into().trim().to_uppercase();
        if currency.is_empty() || currency.len() > 8 {
            return Err(DomainError::validation("currency must be 1-8 characters"));
        }
        let amount = amount.round_dp(2);
        if amount > Self::max_amount() {
            return Err(DomainError::validation(format!(
                "amount {amount} exceeds the maximum of {}",
                Self::max_amount()
            )));
        }
        Ok(Self { amount, currency })
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Multiply by a whole quantity (e.g. nights), keeping the currency.
    ///
    /// Fails when the product does not fit [`Money::max_amount`].
    pub fn times(&self, quantity: u32) -> DomainResult<Self> {
        let amount = self
            .amount
            .checked_mul(Decimal::from(quantity))
            .filter(|a| *a <= Self::max_amount())
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "{self} x {quantity} exceeds the maximum of {}",
                    Self::max_amount()
                ))
            })?;
        Ok(Self {
            amount,
            currency: self.currency.clone(),
        })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    #[test]
    fn new_normalizes_currency_and_scale() {
        let m = Money::new(Decimal::from_str("150.005").unwrap(), " kes ").unwrap();
        assert_eq!(m.currency(), "KES");
        assert_eq!(m.amount(), Decimal::from_str("150.00").unwrap());
    }

    #[test]
    fn new_rejects_negative_amounts() {
        let err = Money::new(Decimal::from(-1), "KES").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn times_multiplies_amount() {
        let m = Money::new(Decimal::from_str("150.00").unwrap(), "KES").unwrap();
        let total = m.times(4).unwrap();
        assert_eq!(total.amount(), Decimal::from(600));
        assert_eq!(total.to_string(), "600.00 KES");
    }

    #[test]
    fn new_rejects_amounts_beyond_storage_precision() {
        assert!(Money::new(Money::max_amount(), "KES").is_ok());
        let err = Money::new(Decimal::from_str("100000000.00").unwrap(), "KES").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        let err = Money::new(Decimal::from_scientific("1e28").unwrap(), "KES").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn times_fails_instead_of_overflowing() {
        let top = Money::new(Money::max_amount(), "KES").unwrap();
        assert!(matches!(top.times(2), Err(DomainError::Validation(_))));
        assert!(matches!(top.times(u32::MAX), Err(DomainError::Validation(_))));
        assert_eq!(top.times(1).unwrap(), top);
    }
}
