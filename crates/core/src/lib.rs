//! `storefront-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    BannerId, CartId, CartLineId, CategoryId, ContactId, OrderId, ProductId, ProductImageId,
    StockEntryId, StoreInfoId, UserId, WishlistEntryId,
};
pub use value_object::{Money, ValueObject};
