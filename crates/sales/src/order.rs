use serde::{Deserialize, Serialize};

use storefront_core::{CartId, DomainError, DomainResult, Entity, OrderId};

use crate::cart::Cart;

/// Delivery status of an order. Variants are declared in lifecycle order and
/// compare accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Preparing,
    InTransit,
    Delivered,
    Accepted,
    Returned,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Preparing,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Accepted,
        OrderStatus::Returned,
    ];

    /// Legacy small-integer code stored in the `orders.status` column.
    pub fn code(self) -> i16 {
        match self {
            OrderStatus::Preparing => 1,
            OrderStatus::InTransit => 2,
            OrderStatus::Delivered => 3,
            OrderStatus::Accepted => 4,
            OrderStatus::Returned => 5,
        }
    }

    pub fn from_code(code: i16) -> DomainResult<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or_else(|| DomainError::validation(format!("unknown order status code {code}")))
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Preparing => "Preparing",
            OrderStatus::InTransit => "In transit",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Accepted => "Accepted",
            OrderStatus::Returned => "Returned",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

const MAX_PHONE_LEN: usize = 13;
const MAX_TEXT_LEN: usize = 255;

/// Who receives the order and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderContact {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: String,
    pub address: String,
}

impl OrderContact {
    pub fn validate(&self) -> DomainResult<()> {
        for (field, value) in [("full name", &self.full_name), ("address", &self.address)] {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!("{field} cannot be empty")));
            }
            if value.chars().count() > MAX_TEXT_LEN {
                return Err(DomainError::validation(format!(
                    "{field} cannot exceed {MAX_TEXT_LEN} characters"
                )));
            }
        }
        let phone = self.phone.trim();
        if phone.is_empty() || phone.chars().count() > MAX_PHONE_LEN {
            return Err(DomainError::validation(format!(
                "phone must be 1 to {MAX_PHONE_LEN} characters"
            )));
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(DomainError::validation("email must contain '@'"));
            }
        }
        Ok(())
    }
}

/// An order placed from a cart.
///
/// `cart_id` is nulled when the cart is deleted; the order itself stays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    cart_id: Option<CartId>,
    contact: OrderContact,
    status: OrderStatus,
}

impl Order {
    /// Place an order for an active cart. The caller checks out the cart in
    /// the same unit of work.
    pub fn place(id: OrderId, cart: &Cart, contact: OrderContact) -> DomainResult<Self> {
        cart.ensure_active()?;
        contact.validate()?;
        Ok(Self {
            id,
            cart_id: Some(cart.id()),
            contact,
            status: OrderStatus::Preparing,
        })
    }

    pub fn from_parts(
        id: OrderId,
        cart_id: Option<CartId>,
        contact: OrderContact,
        status: OrderStatus,
    ) -> Self {
        Self {
            id,
            cart_id,
            contact,
            status,
        }
    }

    pub fn cart_id(&self) -> Option<CartId> {
        self.cart_id
    }

    pub fn contact(&self) -> &OrderContact {
        &self.contact
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Move the order forward. Statuses never go back.
    pub fn advance_to(&mut self, status: OrderStatus) -> DomainResult<()> {
        if status <= self.status {
            return Err(DomainError::conflict(format!(
                "order {} cannot move from {:?} to {:?}",
                self.id, self.status, status
            )));
        }
        self.status = status;
        Ok(())
    }

    pub fn detach_cart(&mut self) {
        self.cart_id = None;
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> OrderId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> OrderContact {
        OrderContact {
            full_name: "Aziza Karimova".to_string(),
            email: Some("aziza@example.com".to_string()),
            phone: "+998901234567".to_string(),
            address: "Chilonzor 9".to_string(),
        }
    }

    #[test]
    fn placed_order_starts_preparing_and_references_cart() {
        let cart = Cart::open(CartId::new(3), None);
        let order = Order::place(OrderId::new(1), &cart, contact()).unwrap();
        assert_eq!(order.status(), OrderStatus::Preparing);
        assert_eq!(order.cart_id(), Some(CartId::new(3)));
    }

    #[test]
    fn cannot_place_order_from_checked_out_cart() {
        let mut cart = Cart::open(CartId::new(3), None);
        cart.check_out(chrono::Utc::now()).unwrap();
        let err = Order::place(OrderId::new(1), &cart, contact()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn phone_longer_than_thirteen_is_rejected() {
        let mut c = contact();
        c.phone = "+99890123456789".to_string();
        assert!(matches!(c.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn status_only_moves_forward() {
        let cart = Cart::open(CartId::new(3), None);
        let mut order = Order::place(OrderId::new(1), &cart, contact()).unwrap();
        order.advance_to(OrderStatus::InTransit).unwrap();
        order.advance_to(OrderStatus::Delivered).unwrap();

        let err = order.advance_to(OrderStatus::Preparing).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        let err = order.advance_to(OrderStatus::Delivered).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        order.advance_to(OrderStatus::Returned).unwrap();
        assert_eq!(order.status(), OrderStatus::Returned);
    }

    #[test]
    fn status_codes_match_legacy_column_values() {
        let codes: Vec<i16> = OrderStatus::ALL.iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 5]);
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::from_code(status.code()).unwrap(), status);
        }
        assert!(OrderStatus::from_code(0).is_err());
        assert!(OrderStatus::from_code(6).is_err());
    }

    #[test]
    fn status_displays_its_label() {
        assert_eq!(OrderStatus::InTransit.to_string(), "In transit");
        assert_eq!(OrderStatus::Preparing.to_string(), "Preparing");
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&OrderStatus::InTransit).unwrap();
        assert_eq!(json, "\"in_transit\"");
    }
}
