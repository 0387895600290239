use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{
    CartId, CartLineId, DomainError, DomainResult, Entity, Money, ProductId, ProductImageId,
    UserId,
};

/// Shopping cart header. Lines live in their own table keyed by `cart_id`.
///
/// A cart is created on the first add-to-cart and turned inactive at
/// checkout. `owner` is `None` for anonymous carts and for carts whose user was
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    id: CartId,
    owner: Option<UserId>,
    is_active: bool,
    shopping_date: Option<DateTime<Utc>>,
}

impl Cart {
    pub fn open(id: CartId, owner: Option<UserId>) -> Self {
        Self {
            id,
            owner,
            is_active: true,
            shopping_date: None,
        }
    }

    /// Rebuild a cart from persisted columns.
    pub fn from_parts(
        id: CartId,
        owner: Option<UserId>,
        is_active: bool,
        shopping_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            owner,
            is_active,
            shopping_date,
        }
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn shopping_date(&self) -> Option<DateTime<Utc>> {
        self.shopping_date
    }

    pub fn ensure_active(&self) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::conflict(format!("cart {} is checked out", self.id)));
        }
        Ok(())
    }

    /// Close the cart at checkout.
    pub fn check_out(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.is_active = false;
        self.shopping_date = Some(at);
        Ok(())
    }

    pub fn forget_owner(&mut self) {
        self.owner = None;
    }
}

impl Entity for Cart {
    type Id = CartId;

    fn id(&self) -> CartId {
        self.id
    }
}

/// Input for adding an image variant to a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartLine {
    pub image_id: ProductImageId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// One cart line.
///
/// Product and image references are nulled when the referenced catalog record
/// is deleted; the line (and its cached total) survives for order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    id: CartLineId,
    cart_id: CartId,
    image_id: Option<ProductImageId>,
    product_id: Option<ProductId>,
    quantity: u32,
    total_price: Option<Money>,
}

impl CartLine {
    pub fn create(
        id: CartLineId,
        cart_id: CartId,
        new: NewCartLine,
        unit_price: Money,
    ) -> DomainResult<Self> {
        if new.quantity == 0 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        Ok(Self {
            id,
            cart_id,
            image_id: Some(new.image_id),
            product_id: Some(new.product_id),
            quantity: new.quantity,
            total_price: Some(unit_price.times(new.quantity)?),
        })
    }

    /// Rebuild a line from persisted columns.
    pub fn from_parts(
        id: CartLineId,
        cart_id: CartId,
        image_id: Option<ProductImageId>,
        product_id: Option<ProductId>,
        quantity: u32,
        total_price: Option<Money>,
    ) -> Self {
        Self {
            id,
            cart_id,
            image_id,
            product_id,
            quantity,
            total_price,
        }
    }

    pub fn cart_id(&self) -> CartId {
        self.cart_id
    }

    pub fn image_id(&self) -> Option<ProductImageId> {
        self.image_id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn total_price(&self) -> Option<Money> {
        self.total_price
    }

    /// Add more of the same variant and refresh the cached total.
    pub fn add_quantity(&mut self, more: u32, unit_price: Money) -> DomainResult<()> {
        let quantity = self
            .quantity
            .checked_add(more)
            .ok_or_else(|| DomainError::invariant("cart line quantity overflow"))?;
        self.total_price = Some(unit_price.times(quantity)?);
        self.quantity = quantity;
        Ok(())
    }

    pub fn detach_image(&mut self) {
        self.image_id = None;
    }

    pub fn detach_product(&mut self) {
        self.product_id = None;
    }
}

impl Entity for CartLine {
    type Id = CartLineId;

    fn id(&self) -> CartLineId {
        self.id
    }
}

/// Sum of cached line totals. Lines without a cached total count as zero.
pub fn cart_total<'a>(lines: impl IntoIterator<Item = &'a CartLine>) -> DomainResult<Money> {
    lines
        .into_iter()
        .filter_map(CartLine::total_price)
        .try_fold(Money::ZERO, Money::checked_add)
}
