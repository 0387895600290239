//! Strongly-typed identifiers used across the domain.
//!
//! Storefront records use store-assigned, monotonically increasing row ids so
//! that "descending identity" means "most recently created first". Users come
//! from the external identity provider and keep their UUIDs.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a user (owned by the external identity provider).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
    /// for determinism.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for UserId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid =
            Uuid::from_str(s).map_err(|e| DomainError::invalid_id(format!("UserId: {e}")))?;
        Ok(Self(uuid))
    }
}

macro_rules! impl_row_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(i64);

        impl $t {
            pub fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                if raw <= 0 {
                    return Err(DomainError::invalid_id(format!("{}: must be positive", $name)));
                }
                Ok(Self(raw))
            }
        }
    };
}

impl_row_id!(
    /// Identifier of a catalog category.
    CategoryId,
    "CategoryId"
);
impl_row_id!(
    /// Identifier of a product.
    ProductId,
    "ProductId"
);
impl_row_id!(
    /// Identifier of a product image (the listing/cart variant of a product).
    ProductImageId,
    "ProductImageId"
);
impl_row_id!(
    /// Identifier of a stock entry (inventory ledger event).
    StockEntryId,
    "StockEntryId"
);
impl_row_id!(CartId, "CartId");
impl_row_id!(CartLineId, "CartLineId");
impl_row_id!(OrderId, "OrderId");
impl_row_id!(WishlistEntryId, "WishlistEntryId");
impl_row_id!(BannerId, "BannerId");
impl_row_id!(ContactId, "ContactId");
impl_row_id!(StoreInfoId, "StoreInfoId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_ids_order_by_raw_value() {
        let older = ProductId::new(3);
        let newer = ProductId::new(11);
        assert!(newer > older);
    }

    #[test]
    fn row_id_parse_rejects_non_positive_and_garbage() {
        assert_eq!("17".parse::<ProductId>().unwrap(), ProductId::new(17));
        assert!("0".parse::<ProductId>().is_err());
        assert!("-4".parse::<StockEntryId>().is_err());
        assert!("abc".parse::<CartId>().is_err());
    }

    #[test]
    fn row_ids_serialize_transparently() {
        let json = serde_json::to_string(&OrderId::new(9)).unwrap();
        assert_eq!(json, "9");
    }

    #[test]
    fn user_id_round_trips_through_display() {
        let id = UserId::new();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
