//! Storefront home page read model.

use serde::{Deserialize, Serialize};

use storefront_catalog::{Banner, Category, Contact, Page, ProductImage};
use storefront_sales::WishlistEntry;

/// Everything the landing page renders in one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomePage {
    /// Active banners only.
    pub banners: Vec<Banner>,
    pub categories: Vec<Category>,
    /// Product images, newest first.
    pub products: Page<ProductImage>,
    /// The viewer's wishlist; empty for anonymous visitors.
    pub wishlist: Vec<WishlistEntry>,
    pub contacts: Vec<Contact>,
}

impl HomePage {
    /// Whether the viewer has liked the product behind a listed image.
    pub fn is_liked(&self, image: &ProductImage) -> bool {
        self.wishlist
            .iter()
            .any(|w| w.product_id == image.product_id())
    }
}
