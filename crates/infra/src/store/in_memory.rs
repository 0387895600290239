//! In-memory storefront store.
//!
//! Intended for tests/dev. Not optimized for performance: every write clones
//! the tables, mutates the copy and swaps it in on success, which gives
//! all-or-nothing writes with the mutex acting as the row lock.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use storefront_catalog::{
    Banner, Category, Contact, NewBanner, NewCategory, NewProduct, NewProductImage, Page,
    Paginator, Product, ProductImage, StoreInfo,
};
use storefront_core::{
    BannerId, CartId, CartLineId, CategoryId, ContactId, DomainError, Entity, OrderId, ProductId,
    ProductImageId, StockEntryId, StoreInfoId, UserId, WishlistEntryId,
};
use storefront_inventory::{NewStockEntry, StockEntry};
use storefront_sales::{
    Cart, CartLine, NewCartLine, Order, OrderContact, OrderStatus, WishlistEntry,
};

use super::{CartOwner, LedgerTx, UnitOfWork};
use crate::error::{StoreError, StoreResult};
use crate::home::HomePage;

#[derive(Debug, Default, Clone)]
struct Sequence(i64);

impl Sequence {
    fn next(&mut self) -> i64 {
        self.0 += 1;
        self.0
    }
}

#[derive(Debug, Default, Clone)]
struct Sequences {
    category: Sequence,
    product: Sequence,
    image: Sequence,
    stock_entry: Sequence,
    cart: Sequence,
    cart_line: Sequence,
    order: Sequence,
    wishlist: Sequence,
    banner: Sequence,
    contact: Sequence,
    store_info: Sequence,
}

#[derive(Debug, Default, Clone)]
struct Tables {
    seq: Sequences,
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    images: BTreeMap<ProductImageId, ProductImage>,
    stock_entries: BTreeMap<StockEntryId, StockEntry>,
    carts: BTreeMap<CartId, Cart>,
    cart_lines: BTreeMap<CartLineId, CartLine>,
    orders: BTreeMap<OrderId, Order>,
    wishlist: BTreeMap<WishlistEntryId, WishlistEntry>,
    banners: BTreeMap<BannerId, Banner>,
    contacts: BTreeMap<ContactId, Contact>,
    store_infos: BTreeMap<StoreInfoId, StoreInfo>,
}

impl Tables {
    fn product(&self, id: ProductId) -> StoreResult<&Product> {
        self.products
            .get(&id)
            .ok_or_else(|| StoreError::not_found("product", id))
    }

    fn image(&self, id: ProductImageId) -> StoreResult<&ProductImage> {
        self.images
            .get(&id)
            .ok_or_else(|| StoreError::not_found("product image", id))
    }

    fn cart_mut(&mut self, id: CartId) -> StoreResult<&mut Cart> {
        self.carts
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("cart", id))
    }

    fn open_cart(&mut self, owner: Option<UserId>) -> CartId {
        let id = CartId::new(self.seq.cart.next());
        self.carts.insert(id, Cart::open(id, owner));
        id
    }

    fn resolve_cart(&mut self, owner: CartOwner) -> StoreResult<CartId> {
        match owner {
            CartOwner::User(user) => {
                let existing = self
                    .carts
                    .values()
                    .find(|c| c.owner() == Some(user) && c.is_active())
                    .map(Cart::id);
                Ok(existing.unwrap_or_else(|| self.open_cart(Some(user))))
            }
            CartOwner::Anonymous(None) => Ok(self.open_cart(None)),
            CartOwner::Anonymous(Some(id)) => {
                self.cart_mut(id)?.ensure_active()?;
                Ok(id)
            }
        }
    }

    /// ON DELETE SET NULL for cart lines pointing at the image.
    fn remove_image(&mut self, id: ProductImageId) {
        self.images.remove(&id);
        for line in self.cart_lines.values_mut() {
            if line.image_id() == Some(id) {
                line.detach_image();
            }
        }
    }

    /// Product cascade: images, stock entries and wishlist rows go with it;
    /// cart lines keep their cached totals but lose the reference.
    fn remove_product(&mut self, id: ProductId) {
        self.products.remove(&id);

        let images: Vec<ProductImageId> = self
            .images
            .values()
            .filter(|i| i.product_id() == id)
            .map(ProductImage::id)
            .collect();
        for image in images {
            self.remove_image(image);
        }

        self.stock_entries.retain(|_, e| e.product_id != id);
        self.wishlist.retain(|_, w| w.product_id != id);
        for line in self.cart_lines.values_mut() {
            if line.product_id() == Some(id) {
                line.detach_product();
            }
        }
    }

    fn remove_cart(&mut self, id: CartId) {
        self.carts.remove(&id);
        self.cart_lines.retain(|_, l| l.cart_id() != id);
        for order in self.orders.values_mut() {
            if order.cart_id() == Some(id) {
                order.detach_cart();
            }
        }
    }

    fn lines_of(&self, cart_id: CartId) -> Vec<CartLine> {
        self.cart_lines
            .values()
            .filter(|l| l.cart_id() == cart_id)
            .cloned()
            .collect()
    }

    fn wishlist_of(&self, user: UserId) -> Vec<WishlistEntry> {
        self.wishlist
            .values()
            .filter(|w| w.user_id == user)
            .copied()
            .collect()
    }
}

impl LedgerTx for Tables {
    fn lock_product(&mut self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.products.get(&id).cloned())
    }

    fn stock_entry(&mut self, id: StockEntryId) -> StoreResult<Option<StockEntry>> {
        Ok(self.stock_entries.get(&id).cloned())
    }

    fn set_product_quantity(&mut self, id: ProductId, quantity: i64) -> StoreResult<()> {
        let product = self
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("product", id))?;
        product.set_on_hand(quantity)?;
        Ok(())
    }

    fn insert_stock_entry(&mut self, entry: NewStockEntry) -> StoreResult<StockEntry> {
        self.product(entry.product_id)?;
        let id = StockEntryId::new(self.seq.stock_entry.next());
        let entry = StockEntry::from_new(id, entry);
        self.stock_entries.insert(id, entry.clone());
        Ok(entry)
    }

    fn update_stock_entry(&mut self, entry: &StockEntry) -> StoreResult<()> {
        let slot = self
            .stock_entries
            .get_mut(&entry.id)
            .ok_or_else(|| StoreError::from(DomainError::stale("stock entry", entry.id)))?;
        *slot = entry.clone();
        Ok(())
    }
}

/// In-memory store for every storefront table.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> StoreResult<T> {
        let tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&tables))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> StoreResult<T>) -> StoreResult<T> {
        let mut tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        let mut working = tables.clone();
        let out = f(&mut working)?;
        *tables = working;
        Ok(out)
    }

    // --- catalog -----------------------------------------------------------

    pub fn create_category(&self, new: NewCategory) -> StoreResult<Category> {
        self.write(|t| {
            let id = CategoryId::new(t.seq.category.next());
            let category = Category::create(id, new)?;
            t.categories.insert(id, category.clone());
            debug!(category_id = %id, "category created");
            Ok(category)
        })
    }

    pub fn category(&self, id: CategoryId) -> StoreResult<Category> {
        self.read(|t| t.categories.get(&id).cloned())?
            .ok_or_else(|| StoreError::not_found("category", id))
    }

    pub fn categories(&self) -> StoreResult<Vec<Category>> {
        self.read(|t| t.categories.values().cloned().collect())
    }

    /// Deletes the category and, through the product cascade, everything
    /// hanging off its products.
    pub fn delete_category(&self, id: CategoryId) -> StoreResult<()> {
        self.write(|t| {
            if t.categories.remove(&id).is_none() {
                return Err(StoreError::not_found("category", id));
            }
            let products: Vec<ProductId> = t
                .products
                .values()
                .filter(|p| p.category_id() == id)
                .map(Product::id)
                .collect();
            for product in &products {
                t.remove_product(*product);
            }
            info!(category_id = %id, products = products.len(), "category deleted");
            Ok(())
        })
    }

    pub fn create_product(&self, new: NewProduct) -> StoreResult<Product> {
        self.write(|t| {
            if !t.categories.contains_key(&new.category_id) {
                return Err(StoreError::not_found("category", new.category_id));
            }
            let id = ProductId::new(t.seq.product.next());
            let product = Product::create(id, new)?;
            t.products.insert(id, product.clone());
            debug!(product_id = %id, "product created");
            Ok(product)
        })
    }

    pub fn product(&self, id: ProductId) -> StoreResult<Product> {
        self.read(|t| t.products.get(&id).cloned())?
            .ok_or_else(|| StoreError::not_found("product", id))
    }

    pub fn products_page(
        &self,
        paginator: &Paginator,
        category: Option<CategoryId>,
        requested: Option<&str>,
    ) -> StoreResult<Page<Product>> {
        let products: Vec<Product> = self.read(|t| {
            t.products
                .values()
                .filter(|p| category.is_none_or(|c| p.category_id() == c))
                .cloned()
                .collect()
        })?;
        Ok(paginator.page(products, requested))
    }

    pub fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        self.write(|t| {
            t.product(id)?;
            t.remove_product(id);
            info!(product_id = %id, "product deleted");
            Ok(())
        })
    }

    pub fn create_product_image(&self, new: NewProductImage) -> StoreResult<ProductImage> {
        self.write(|t| {
            t.product(new.product_id)?;
            let id = ProductImageId::new(t.seq.image.next());
            let image = ProductImage::create(id, new)?;
            t.images.insert(id, image.clone());
            Ok(image)
        })
    }

    pub fn product_images_page(
        &self,
        paginator: &Paginator,
        requested: Option<&str>,
    ) -> StoreResult<Page<ProductImage>> {
        let images: Vec<ProductImage> = self.read(|t| t.images.values().cloned().collect())?;
        Ok(paginator.page(images, requested))
    }

    pub fn delete_product_image(&self, id: ProductImageId) -> StoreResult<()> {
        self.write(|t| {
            t.image(id)?;
            t.remove_image(id);
            Ok(())
        })
    }

    /// Stock-entry history of a product in creation order.
    pub fn stock_entries_for(&self, product_id: ProductId) -> StoreResult<Vec<StockEntry>> {
        self.read(|t| {
            t.stock_entries
                .values()
                .filter(|e| e.product_id == product_id)
                .cloned()
                .collect()
        })
    }

    // --- storefront content ------------------------------------------------

    pub fn create_banner(&self, new: NewBanner) -> StoreResult<Banner> {
        self.write(|t| {
            let id = BannerId::new(t.seq.banner.next());
            let banner = Banner::create(id, new)?;
            t.banners.insert(id, banner.clone());
            Ok(banner)
        })
    }

    pub fn deactivate_banner(&self, id: BannerId) -> StoreResult<()> {
        self.write(|t| {
            let banner = t
                .banners
                .get_mut(&id)
                .ok_or_else(|| StoreError::not_found("banner", id))?;
            banner.deactivate();
            Ok(())
        })
    }

    pub fn active_banners(&self) -> StoreResult<Vec<Banner>> {
        self.read(|t| t.banners.values().filter(|b| b.is_active()).cloned().collect())
    }

    /// Stores the contact under a freshly assigned id (the incoming id is ignored).
    pub fn add_contact(&self, mut contact: Contact) -> StoreResult<Contact> {
        self.write(|t| {
            contact.id = ContactId::new(t.seq.contact.next());
            t.contacts.insert(contact.id, contact.clone());
            Ok(contact)
        })
    }

    pub fn contacts(&self) -> StoreResult<Vec<Contact>> {
        self.read(|t| t.contacts.values().cloned().collect())
    }

    /// Stores the address block under a freshly assigned id.
    pub fn add_store_info(&self, mut info: StoreInfo) -> StoreResult<StoreInfo> {
        info.validate()?;
        self.write(|t| {
            info.id = StoreInfoId::new(t.seq.store_info.next());
            t.store_infos.insert(info.id, info.clone());
            Ok(info)
        })
    }

    pub fn store_infos(&self) -> StoreResult<Vec<StoreInfo>> {
        self.read(|t| t.store_infos.values().cloned().collect())
    }

    pub fn home_page(
        &self,
        paginator: &Paginator,
        viewer: Option<UserId>,
        requested: Option<&str>,
    ) -> StoreResult<HomePage> {
        let (banners, categories, images, wishlist, contacts): (
            Vec<Banner>,
            Vec<Category>,
            Vec<ProductImage>,
            Vec<WishlistEntry>,
            Vec<Contact>,
        ) = self.read(|t| {
            (
                t.banners.values().filter(|b| b.is_active()).cloned().collect(),
                t.categories.values().cloned().collect(),
                t.images.values().cloned().collect(),
                viewer.map(|u| t.wishlist_of(u)).unwrap_or_default(),
                t.contacts.values().cloned().collect(),
            )
        })?;
        Ok(HomePage {
            banners,
            categories,
            products: paginator.page(images, requested),
            wishlist,
            contacts,
        })
    }

    // --- carts & orders ----------------------------------------------------

    /// Add `quantity` of an image variant to a cart, merging with an existing
    /// line for the same image and refreshing its cached total.
    pub fn add_to_cart(
        &self,
        owner: CartOwner,
        image_id: ProductImageId,
        quantity: u32,
    ) -> StoreResult<CartLine> {
        self.write(|t| {
            let image = t.image(image_id)?.clone();
            let unit_price = t.product(image.product_id())?.price();
            let cart_id = t.resolve_cart(owner)?;

            let existing = t
                .cart_lines
                .values_mut()
                .find(|l| l.cart_id() == cart_id && l.image_id() == Some(image_id));
            let line = match existing {
                Some(line) => {
                    line.add_quantity(quantity, unit_price)?;
                    line.clone()
                }
                None => {
                    let id = CartLineId::new(t.seq.cart_line.next());
                    let line = CartLine::create(
                        id,
                        cart_id,
                        NewCartLine {
                            image_id,
                            product_id: image.product_id(),
                            quantity,
                        },
                        unit_price,
                    )?;
                    t.cart_lines.insert(id, line.clone());
                    line
                }
            };
            debug!(
                cart_id = %cart_id,
                image_id = %image_id,
                quantity = line.quantity(),
                "cart line saved"
            );
            Ok(line)
        })
    }

    pub fn remove_cart_line(&self, id: CartLineId) -> StoreResult<()> {
        self.write(|t| {
            let cart_id = t
                .cart_lines
                .get(&id)
                .map(CartLine::cart_id)
                .ok_or_else(|| StoreError::not_found("cart line", id))?;
            t.cart_mut(cart_id)?.ensure_active()?;
            t.cart_lines.remove(&id);
            Ok(())
        })
    }

    pub fn cart(&self, id: CartId) -> StoreResult<Cart> {
        self.read(|t| t.carts.get(&id).cloned())?
            .ok_or_else(|| StoreError::not_found("cart", id))
    }

    pub fn active_cart_for(&self, user: UserId) -> StoreResult<Option<Cart>> {
        self.read(|t| {
            t.carts
                .values()
                .find(|c| c.owner() == Some(user) && c.is_active())
                .cloned()
        })
    }

    pub fn cart_lines(&self, cart_id: CartId) -> StoreResult<Vec<CartLine>> {
        self.read(|t| t.lines_of(cart_id))
    }

    pub fn delete_cart(&self, id: CartId) -> StoreResult<()> {
        self.write(|t| {
            t.cart_mut(id)?;
            t.remove_cart(id);
            Ok(())
        })
    }

    /// Turn an active, non-empty cart into an order and close the cart.
    pub fn checkout(
        &self,
        cart_id: CartId,
        contact: OrderContact,
        at: DateTime<Utc>,
    ) -> StoreResult<Order> {
        self.write(|t| {
            t.cart_mut(cart_id)?;
            if t.lines_of(cart_id).is_empty() {
                return Err(DomainError::validation(format!("cart {cart_id} is empty")).into());
            }
            let order_id = OrderId::new(t.seq.order.next());
            let cart = t.cart_mut(cart_id)?;
            let order = Order::place(order_id, cart, contact)?;
            cart.check_out(at)?;
            t.orders.insert(order_id, order.clone());
            info!(order_id = %order_id, cart_id = %cart_id, "order placed");
            Ok(order)
        })
    }

    pub fn order(&self, id: OrderId) -> StoreResult<Order> {
        self.read(|t| t.orders.get(&id).cloned())?
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    pub fn advance_order(&self, id: OrderId, status: OrderStatus) -> StoreResult<Order> {
        self.write(|t| {
            let order = t
                .orders
                .get_mut(&id)
                .ok_or_else(|| StoreError::not_found("order", id))?;
            order.advance_to(status)?;
            info!(order_id = %id, status = %status, "order status advanced");
            Ok(order.clone())
        })
    }

    // --- wishlist & users --------------------------------------------------

    /// Idempotent: liking an already liked product returns the existing entry.
    pub fn add_to_wishlist(
        &self,
        user: UserId,
        product_id: ProductId,
    ) -> StoreResult<WishlistEntry> {
        self.write(|t| {
            t.product(product_id)?;
            if let Some(existing) = t.wishlist.values().find(|w| w.matches(user, product_id)) {
                return Ok(*existing);
            }
            let entry = WishlistEntry {
                id: WishlistEntryId::new(t.seq.wishlist.next()),
                user_id: user,
                product_id,
            };
            t.wishlist.insert(entry.id, entry);
            Ok(entry)
        })
    }

    /// Returns whether an entry was removed.
    pub fn remove_from_wishlist(&self, user: UserId, product_id: ProductId) -> StoreResult<bool> {
        self.write(|t| {
            let before = t.wishlist.len();
            t.wishlist.retain(|_, w| !w.matches(user, product_id));
            Ok(t.wishlist.len() != before)
        })
    }

    pub fn wishlist(&self, user: UserId) -> StoreResult<Vec<WishlistEntry>> {
        self.read(|t| t.wishlist_of(user))
    }

    pub fn is_liked(&self, user: UserId, product_id: ProductId) -> StoreResult<bool> {
        self.read(|t| t.wishlist.values().any(|w| w.matches(user, product_id)))
    }

    /// The identity provider deleted a user: carts become ownerless, the
    /// wishlist goes away.
    pub fn delete_user(&self, user: UserId) -> StoreResult<()> {
        self.write(|t| {
            for cart in t.carts.values_mut() {
                if cart.owner() == Some(user) {
                    cart.forget_owner();
                }
            }
            t.wishlist.retain(|_, w| w.user_id != user);
            info!(user_id = %user, "user data detached");
            Ok(())
        })
    }
}

impl UnitOfWork for InMemoryStore {
    fn atomically<T, F>(&self, work: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn LedgerTx) -> StoreResult<T>,
    {
        self.write(|tables| work(tables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::Money;

    fn seeded() -> (InMemoryStore, Category, Product, ProductImage) {
        let store = InMemoryStore::new();
        let category = store
            .create_category(NewCategory {
                name: "Tools".to_string(),
                title: "Hand tools".to_string(),
                image: "category_img/tools.png".to_string(),
            })
            .unwrap();
        let product = store
            .create_product(NewProduct {
                category_id: category.id(),
                name: "Widget".to_string(),
                quantity: 10,
                price: Money::from_minor(2_00),
                description: String::new(),
            })
            .unwrap();
        let image = store
            .create_product_image(NewProductImage {
                product_id: product.id(),
                image: "product-img/widget.png".to_string(),
            })
            .unwrap();
        (store, category, product, image)
    }

    fn contact() -> OrderContact {
        OrderContact {
            full_name: "Sardor Aliyev".to_string(),
            email: None,
            phone: "+998901112233".to_string(),
            address: "Yunusobod 4".to_string(),
        }
    }

    #[test]
    fn product_requires_existing_category() {
        let store = InMemoryStore::new();
        let err = store
            .create_product(NewProduct {
                category_id: CategoryId::new(42),
                name: "Orphan".to_string(),
                quantity: 0,
                price: Money::ZERO,
                description: String::new(),
            })
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn failed_write_leaves_tables_untouched() {
        let (store, _, product, _) = seeded();
        let err = store.atomically(|tx| {
            tx.set_product_quantity(product.id(), 99)?;
            Err::<(), _>(StoreError::from(DomainError::invariant("boom")))
        });
        assert!(err.is_err());
        assert_eq!(store.product(product.id()).unwrap().quantity(), 10);
    }

    #[test]
    fn deleting_category_cascades_to_products_and_their_rows() {
        let (store, category, product, image) = seeded();
        let user = UserId::new();
        store.add_to_wishlist(user, product.id()).unwrap();
        store
            .atomically(|tx| {
                tx.insert_stock_entry(NewStockEntry {
                    product_id: product.id(),
                    quantity: 1,
                    prior_quantity: 10,
                    notes: String::new(),
                    recorded_at: Utc::now(),
                })
            })
            .unwrap();
        let line = store.add_to_cart(CartOwner::User(user), image.id(), 2).unwrap();

        store.delete_category(category.id()).unwrap();

        assert!(store.product(product.id()).unwrap_err().is_not_found());
        assert!(store.stock_entries_for(product.id()).unwrap().is_empty());
        assert!(store.wishlist(user).unwrap().is_empty());
        let lines = store.cart_lines(line.cart_id()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id(), None);
        assert_eq!(lines[0].image_id(), None);
        assert_eq!(lines[0].total_price(), Some(Money::from_minor(4_00)));
    }

    #[test]
    fn add_to_cart_reuses_active_cart_and_merges_lines() {
        let (store, _, _, image) = seeded();
        let user = UserId::new();

        let first = store.add_to_cart(CartOwner::User(user), image.id(), 1).unwrap();
        let second = store.add_to_cart(CartOwner::User(user), image.id(), 2).unwrap();

        assert_eq!(first.cart_id(), second.cart_id());
        assert_eq!(first.id(), second.id());
        assert_eq!(second.quantity(), 3);
        assert_eq!(second.total_price(), Some(Money::from_minor(6_00)));
        assert_eq!(store.cart_lines(first.cart_id()).unwrap().len(), 1);
    }

    #[test]
    fn anonymous_carts_are_separate_until_continued() {
        let (store, _, _, image) = seeded();
        let a = store.add_to_cart(CartOwner::Anonymous(None), image.id(), 1).unwrap();
        let b = store.add_to_cart(CartOwner::Anonymous(None), image.id(), 1).unwrap();
        assert_ne!(a.cart_id(), b.cart_id());

        let c = store
            .add_to_cart(CartOwner::Anonymous(Some(a.cart_id())), image.id(), 1)
            .unwrap();
        assert_eq!(c.cart_id(), a.cart_id());
        assert_eq!(c.quantity(), 2);
        assert_eq!(store.cart(a.cart_id()).unwrap().owner(), None);
    }

    #[test]
    fn checkout_places_order_and_closes_cart() {
        let (store, _, _, image) = seeded();
        let user = UserId::new();
        let line = store.add_to_cart(CartOwner::User(user), image.id(), 1).unwrap();
        let at = Utc::now();

        let order = store.checkout(line.cart_id(), contact(), at).unwrap();
        assert_eq!(order.status(), OrderStatus::Preparing);
        let cart = store.cart(line.cart_id()).unwrap();
        assert!(!cart.is_active());
        assert_eq!(cart.shopping_date(), Some(at));

        // Closed cart: next add opens a fresh one.
        let next = store.add_to_cart(CartOwner::User(user), image.id(), 1).unwrap();
        assert_ne!(next.cart_id(), line.cart_id());

        // And the closed cart cannot be checked out or edited again.
        assert!(store.checkout(line.cart_id(), contact(), at).is_err());
        assert!(store.remove_cart_line(line.id()).is_err());
    }

    #[test]
    fn empty_cart_cannot_be_checked_out() {
        let (store, _, _, image) = seeded();
        let line = store.add_to_cart(CartOwner::Anonymous(None), image.id(), 1).unwrap();
        store.remove_cart_line(line.id()).unwrap();

        let err = store.checkout(line.cart_id(), contact(), Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))));
        assert!(store.cart(line.cart_id()).unwrap().is_active());
    }

    #[test]
    fn deleting_cart_keeps_order_without_reference() {
        let (store, _, _, image) = seeded();
        let line = store.add_to_cart(CartOwner::Anonymous(None), image.id(), 1).unwrap();
        let order = store.checkout(line.cart_id(), contact(), Utc::now()).unwrap();

        store.delete_cart(line.cart_id()).unwrap();

        assert!(store.cart_lines(line.cart_id()).unwrap().is_empty());
        assert_eq!(store.order(order.id()).unwrap().cart_id(), None);
    }

    #[test]
    fn wishlist_is_unique_per_user_and_product() {
        let (store, _, product, _) = seeded();
        let user = UserId::new();
        let first = store.add_to_wishlist(user, product.id()).unwrap();
        let again = store.add_to_wishlist(user, product.id()).unwrap();
        assert_eq!(first, again);
        assert_eq!(store.wishlist(user).unwrap().len(), 1);
        assert!(store.is_liked(user, product.id()).unwrap());

        assert!(store.remove_from_wishlist(user, product.id()).unwrap());
        assert!(!store.remove_from_wishlist(user, product.id()).unwrap());
        assert!(!store.is_liked(user, product.id()).unwrap());
    }

    #[test]
    fn deleting_user_orphans_carts_and_drops_wishlist() {
        let (store, _, product, image) = seeded();
        let user = UserId::new();
        let line = store.add_to_cart(CartOwner::User(user), image.id(), 1).unwrap();
        store.add_to_wishlist(user, product.id()).unwrap();

        store.delete_user(user).unwrap();

        assert_eq!(store.cart(line.cart_id()).unwrap().owner(), None);
        assert!(store.wishlist(user).unwrap().is_empty());
        assert_eq!(store.active_cart_for(user).unwrap(), None);
    }

    #[test]
    fn order_status_updates_persist() {
        let (store, _, _, image) = seeded();
        let line = store.add_to_cart(CartOwner::Anonymous(None), image.id(), 1).unwrap();
        let order = store.checkout(line.cart_id(), contact(), Utc::now()).unwrap();

        store.advance_order(order.id(), OrderStatus::InTransit).unwrap();
        assert_eq!(store.order(order.id()).unwrap().status(), OrderStatus::InTransit);
        assert!(store.advance_order(order.id(), OrderStatus::Preparing).is_err());
    }
}
