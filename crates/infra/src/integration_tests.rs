//! Integration tests for the storefront pipeline on the in-memory store.
//!
//! Tests: catalog → ledger → home page → cart → checkout → cascades
//!
//! Verifies:
//! - Stock entries keep on-hand counts equal to the sum of their deltas
//! - The home page grid is newest first and tolerant of bad page requests
//! - Checkout and deletions leave consistent rows behind

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use storefront_catalog::{
        Contact, NewBanner, NewCategory, NewProduct, NewProductImage, Paginator, Product,
        ProductImage,
    };
    use storefront_core::{ContactId, Entity, Money, ProductId, UserId};
    use storefront_inventory::{RecordStockEntry, net_change};
    use storefront_sales::{OrderContact, OrderStatus, cart_total};

    use crate::ledger::InventoryLedger;
    use crate::store::{CartOwner, InMemoryStore};

    fn setup() -> InventoryLedger<Arc<InMemoryStore>> {
        InventoryLedger::new(Arc::new(InMemoryStore::new()))
    }

    fn seed_catalog(store: &InMemoryStore, products: usize) -> Vec<(Product, ProductImage)> {
        let category = store
            .create_category(NewCategory {
                name: "Phones".to_string(),
                title: "Smartphones".to_string(),
                image: "category_img/phones.png".to_string(),
            })
            .unwrap();
        (1..=products)
            .map(|n| {
                let product = store
                    .create_product(NewProduct {
                        category_id: category.id(),
                        name: format!("Phone {n}"),
                        quantity: 0,
                        price: Money::from_minor(100_00 * n as u64),
                        description: String::new(),
                    })
                    .unwrap();
                let image = store
                    .create_product_image(NewProductImage {
                        product_id: product.id(),
                        image: format!("product-img/phone-{n}.png"),
                    })
                    .unwrap();
                (product, image)
            })
            .collect()
    }

    fn buyer() -> OrderContact {
        OrderContact {
            full_name: "Malika Karimova".to_string(),
            email: Some("malika@example.com".to_string()),
            phone: "+998935550011".to_string(),
            address: "Chilonzor 9, Tashkent".to_string(),
        }
    }

    #[test]
    fn ledger_history_matches_on_hand_after_mixed_entries() {
        let ledger = setup();
        let catalog = seed_catalog(ledger.store(), 1);
        let phone = catalog[0].0.id();

        let a = ledger
            .record(&RecordStockEntry::create(phone, 12, Utc::now()))
            .unwrap();
        ledger
            .record(&RecordStockEntry::create(phone, -5, Utc::now()))
            .unwrap();
        ledger
            .record(&RecordStockEntry::edit(a.entry.id, phone, 20, Utc::now()))
            .unwrap();

        let history = ledger.store().stock_entries_for(phone).unwrap();
        let on_hand = ledger.store().product(phone).unwrap().quantity();
        assert_eq!(on_hand, 15);
        assert_eq!(net_change(&history), on_hand);
    }

    #[test]
    fn home_page_lists_newest_images_first_and_clamps_page_requests() {
        let ledger = setup();
        let store = ledger.store();
        seed_catalog(store, 20);
        store
            .create_banner(NewBanner {
                title: "Spring sale".to_string(),
                subtitle: None,
                image: "banner/spring.png".to_string(),
                is_active: true,
            })
            .unwrap();
        let hidden = store
            .create_banner(NewBanner {
                title: "Winter sale".to_string(),
                subtitle: Some("ended".to_string()),
                image: "banner/winter.png".to_string(),
                is_active: true,
            })
            .unwrap();
        store.deactivate_banner(hidden.id()).unwrap();

        let paginator = Paginator::default();

        let first = store.home_page(&paginator, None, None).unwrap();
        assert_eq!(first.banners.len(), 1);
        assert_eq!(first.products.number, 1);
        assert_eq!(first.products.num_pages, 3);
        let ids: Vec<i64> = first.products.items.iter().map(|i| i.id().get()).collect();
        assert_eq!(ids, vec![20, 19, 18, 17, 16, 15, 14, 13]);

        let garbage = store.home_page(&paginator, None, Some("abc")).unwrap();
        assert_eq!(garbage.products, first.products);

        let beyond = store.home_page(&paginator, None, Some("99")).unwrap();
        assert_eq!(beyond.products.number, 3);
        let ids: Vec<i64> = beyond.products.items.iter().map(|i| i.id().get()).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
    }

    #[test]
    fn home_page_marks_the_viewers_wishlist() {
        let ledger = setup();
        let store = ledger.store();
        let catalog = seed_catalog(store, 3);
        let viewer = UserId::new();
        store.add_to_wishlist(viewer, catalog[1].0.id()).unwrap();

        let page = store
            .home_page(&Paginator::default(), Some(viewer), None)
            .unwrap();
        let liked: Vec<ProductId> = page
            .products
            .items
            .iter()
            .filter(|i| page.is_liked(i))
            .map(|i| i.product_id())
            .collect();
        assert_eq!(liked, vec![catalog[1].0.id()]);

        let anonymous = store.home_page(&Paginator::default(), None, None).unwrap();
        assert!(anonymous.wishlist.is_empty());
    }

    #[test]
    fn shopping_flow_from_stock_to_delivered_order() {
        let ledger = setup();
        let store = ledger.store();
        let catalog = seed_catalog(store, 2);
        let (phone, image) = (&catalog[0].0, &catalog[0].1);
        let (other, other_image) = (&catalog[1].0, &catalog[1].1);
        ledger
            .record(&RecordStockEntry::create(phone.id(), 5, Utc::now()).with_notes("supplier A"))
            .unwrap();
        ledger
            .record(&RecordStockEntry::create(other.id(), 2, Utc::now()))
            .unwrap();

        let user = UserId::new();
        store.add_to_cart(CartOwner::User(user), image.id(), 2).unwrap();
        let line = store.add_to_cart(CartOwner::User(user), other_image.id(), 1).unwrap();
        let cart = store.active_cart_for(user).unwrap().unwrap();
        assert_eq!(cart.id(), line.cart_id());

        let lines = store.cart_lines(cart.id()).unwrap();
        assert_eq!(cart_total(lines.iter()).unwrap(), Money::from_minor(400_00));

        let order = store.checkout(cart.id(), buyer(), Utc::now()).unwrap();
        assert_eq!(order.cart_id(), Some(cart.id()));
        assert_eq!(store.active_cart_for(user).unwrap(), None);

        for status in [
            OrderStatus::InTransit,
            OrderStatus::Delivered,
            OrderStatus::Accepted,
        ] {
            store.advance_order(order.id(), status).unwrap();
        }
        assert_eq!(store.order(order.id()).unwrap().status(), OrderStatus::Accepted);
    }

    #[test]
    fn deleting_a_product_keeps_cart_totals_and_drops_its_history() {
        let ledger = setup();
        let store = ledger.store();
        let catalog = seed_catalog(store, 1);
        let (phone, image) = (&catalog[0].0, &catalog[0].1);
        ledger
            .record(&RecordStockEntry::create(phone.id(), 3, Utc::now()))
            .unwrap();
        let line = store.add_to_cart(CartOwner::Anonymous(None), image.id(), 3).unwrap();

        store.delete_product(phone.id()).unwrap();

        assert!(store.stock_entries_for(phone.id()).unwrap().is_empty());
        let lines = store.cart_lines(line.cart_id()).unwrap();
        assert_eq!(lines[0].product_id(), None);
        assert_eq!(
            cart_total(lines.iter()).unwrap(),
            Money::from_minor(300_00)
        );
        assert!(
            ledger
                .record(&RecordStockEntry::create(phone.id(), 1, Utc::now()))
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn contacts_and_store_info_are_listed() {
        let ledger = setup();
        let store = ledger.store();
        store
            .add_contact(Contact {
                id: ContactId::new(1),
                whatsapp: "+998901234567".to_string(),
                twitter: "@shop".to_string(),
                facebook: "shop".to_string(),
                telegram: "@shop".to_string(),
                phone: "+998712000000".to_string(),
            })
            .unwrap();
        let home = store.home_page(&Paginator::default(), None, None).unwrap();
        assert_eq!(home.contacts.len(), 1);
        assert!(home.products.is_empty());
        assert_eq!(home.products.num_pages, 1);
    }
}
