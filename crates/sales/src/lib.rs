//! Sales domain module: carts, orders and wishlists.
//!
//! Pure domain logic (no IO, no storage). Prices come in from the catalog as
//! `Money`; this crate never looks products up itself.

pub mod cart;
pub mod order;
pub mod wishlist;

pub use cart::{Cart, CartLine, NewCartLine, cart_total};
pub use order::{Order, OrderContact, OrderStatus};
pub use wishlist::WishlistEntry;
