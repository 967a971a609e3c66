//! Payment amounts using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`PaymentAmount`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// Zero or negative amount.
    #[error("amount must be positive (got {0})")]
    NotPositive(Decimal),
    /// More than two decimal places.
    #[error("amount must have at most two decimal places (got {0})")]
    TooPrecise(Decimal),
}

/// A strictly positive amount in the store currency's standard unit (dollars,
/// not cents).
///
/// ```
/// use rust_decimal::Decimal;
/// use workorder_core::PaymentAmount;
///
/// let amount = PaymentAmount::new(Decimal::new(25000, 2)).unwrap();
/// assert_eq!(amount.to_cents(), 25_000);
/// assert!(PaymentAmount::new(Decimal::ZERO).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct PaymentAmount(Decimal);

impl PaymentAmount {
    /// Validate and wrap an amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not positive or has sub-cent precision.
    pub fn new(amount: Decimal) -> Result<Self, AmountError> {
        if amount <= Decimal::ZERO {
            return Err(AmountError::NotPositive(amount));
        }
        if amount.normalize().scale() > 2 {
            return Err(AmountError::TooPrecise(amount));
        }
        Ok(Self(amount))
    }

    /// The wrapped decimal.
    #[must_use]
    pub const fn get(&self) -> Decimal {
        self.0
    }

    /// Amount in cents, the unit payment processors expect.
    #[must_use]
    pub fn to_cents(&self) -> i64 {
        let cents = (self.0 * Decimal::ONE_HUNDRED).trunc();
        i64::try_from(cents).unwrap_or(i64::MAX)
    }
}

impl TryFrom<Decimal> for PaymentAmount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PaymentAmount> for Decimal {
    fn from(amount: PaymentAmount) -> Self {
        amount.0
    }
}

impl std::fmt::Display for PaymentAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}
