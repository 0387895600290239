//! Value objects: equality by value, not identity.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values; to
/// "modify" one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// An amount of money in the smallest currency unit (e.g. tiyin, cents).
///
/// Prices in the storefront are stored with two decimal places, so `Money`
/// keeps integer hundredths and never touches floating point.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    pub fn minor(self) -> u64 {
        self.0
    }

    /// Multiply a unit price by a line quantity.
    pub fn times(self, quantity: u32) -> DomainResult<Money> {
        self.0
            .checked_mul(u64::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::invariant("money amount overflow"))
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("money amount overflow"))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}
