//! Catalog module.
//!
//! Categories, products and their listing images, the storefront's static
//! content, and the page-slicing helper used by every catalog list view.
//! Pure domain logic: no IO, no storage.

pub mod category;
pub mod content;
pub mod pagination;
pub mod product;

pub use category::{Category, NewCategory};
pub use content::{Banner, Contact, NewBanner, StoreInfo};
pub use pagination::{DEFAULT_PAGE_SIZE, Page, PageWindow, Paginator};
pub use product::{MAX_PRICE, NewProduct, NewProductImage, Product, ProductImage};
