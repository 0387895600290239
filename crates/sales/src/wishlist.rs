use serde::{Deserialize, Serialize};

use storefront_core::{Entity, ProductId, UserId, WishlistEntryId};

/// A product a user has liked. At most one entry exists per (user, product).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub id: WishlistEntryId,
    pub user_id: UserId,
    pub product_id: ProductId,
}

impl WishlistEntry {
    pub fn matches(&self, user_id: UserId, product_id: ProductId) -> bool {
        self.user_id == user_id && self.product_id == product_id
    }
}

impl Entity for WishlistEntry {
    type Id = WishlistEntryId;

    fn id(&self) -> WishlistEntryId {
        self.id
    }
}
