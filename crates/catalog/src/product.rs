use serde::{Deserialize, Serialize};

use storefront_core::{
    CategoryId, DomainError, DomainResult, Entity, Money, ProductId, ProductImageId,
};

use crate::category::validate_name;

/// Largest unit price a product may carry (eight digits, two of them decimals).
pub const MAX_PRICE: Money = Money::from_minor(99_999_999);

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub category_id: CategoryId,
    pub name: String,
    /// Initial on-hand count. Later changes go through the inventory ledger.
    pub quantity: i64,
    pub price: Money,
    pub description: String,
}

impl NewProduct {
    pub fn validate(&self) -> DomainResult<()> {
        validate_name("product name", &self.name)?;
        if self.quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        if self.price > MAX_PRICE {
            return Err(DomainError::validation(format!(
                "price cannot exceed {MAX_PRICE}"
            )));
        }
        Ok(())
    }
}

/// A purchasable product.
///
/// `quantity` is the authoritative on-hand count. It only changes through
/// [`Product::set_on_hand`], which the inventory ledger drives; the ledger is
/// also what keeps it non-negative across stock-entry history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    category_id: CategoryId,
    name: String,
    quantity: i64,
    price: Money,
    description: String,
}

impl Product {
    pub fn create(id: ProductId, new: NewProduct) -> DomainResult<Self> {
        new.validate()?;
        Ok(Self {
            id,
            category_id: new.category_id,
            name: new.name,
            quantity: new.quantity,
            price: new.price,
            description: new.description,
        })
    }

    /// Rebuild a product from persisted columns (no validation: storage is trusted).
    pub fn from_parts(
        id: ProductId,
        category_id: CategoryId,
        name: String,
        quantity: i64,
        price: Money,
        description: String,
    ) -> Self {
        Self {
            id,
            category_id,
            name,
            quantity,
            price,
            description,
        }
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn in_stock(&self) -> bool {
        self.quantity > 0
    }

    pub fn set_on_hand(&mut self, quantity: i64) -> DomainResult<()> {
        if quantity < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        self.quantity = quantity;
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }
}

/// Input for attaching an image to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProductImage {
    pub product_id: ProductId,
    pub image: String,
}

/// One picture of a product. The home page lists these, and cart lines point
/// at the exact variant the shopper picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    id: ProductImageId,
    product_id: ProductId,
    image: String,
}

impl ProductImage {
    pub fn create(id: ProductImageId, new: NewProductImage) -> DomainResult<Self> {
        if new.image.trim().is_empty() {
            return Err(DomainError::validation("image path cannot be empty"));
        }
        Ok(Self {
            id,
            product_id: new.product_id,
            image: new.image,
        })
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn image(&self) -> &str {
        &self.image
    }
}

impl Entity for ProductImage {
    type Id = ProductImageId;

    fn id(&self) -> ProductImageId {
        self.id
    }
}
