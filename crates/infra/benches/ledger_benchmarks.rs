use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use std::sync::Arc;
use storefront_catalog::{NewCategory, NewProduct, NewProductImage, Paginator};
use storefront_core::{Entity, Money, ProductId};
use storefront_infra::{InMemoryStore, InventoryLedger};
use storefront_inventory::RecordStockEntry;

fn store_with_products(count: usize) -> (Arc<InMemoryStore>, Vec<ProductId>) {
    let store = Arc::new(InMemoryStore::new());
    let category = store
        .create_category(NewCategory {
            name: "Bench".to_string(),
            title: String::new(),
            image: "category_img/bench.png".to_string(),
        })
        .unwrap();
    let products = (0..count)
        .map(|n| {
            let product = store
                .create_product(NewProduct {
                    category_id: category.id(),
                    name: format!("Item {n}"),
                    quantity: 1_000,
                    price: Money::from_minor(5_00),
                    description: String::new(),
                })
                .unwrap();
            store
                .create_product_image(NewProductImage {
                    product_id: product.id(),
                    image: format!("product-img/{n}.png"),
                })
                .unwrap();
            product.id()
        })
        .collect();
    (store, products)
}

fn bench_ledger_record_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_record_latency");

    // Every write clones the tables, so latency grows with catalog size.
    for catalog_size in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("create_entry", catalog_size),
            catalog_size,
            |b, &size| {
                let (store, products) = store_with_products(size);
                let ledger = InventoryLedger::new(store);
                let product = products[0];
                b.iter(|| {
                    ledger
                        .record(black_box(&RecordStockEntry::create(product, 1, Utc::now())))
                        .unwrap()
                });
            },
        );
    }

    group.bench_function("edit_entry", |b| {
        let (store, products) = store_with_products(10);
        let ledger = InventoryLedger::new(store);
        let product = products[0];
        let entry = ledger
            .record(&RecordStockEntry::create(product, 1, Utc::now()))
            .unwrap()
            .entry;
        let mut flip = false;
        b.iter(|| {
            flip = !flip;
            let quantity = if flip { 2 } else { 1 };
            ledger
                .record(black_box(&RecordStockEntry::edit(
                    entry.id,
                    product,
                    quantity,
                    Utc::now(),
                )))
                .unwrap()
        });
    });

    group.finish();
}

fn bench_home_page_pagination(c: &mut Criterion) {
    let mut group = c.benchmark_group("home_page_pagination");
    let paginator = Paginator::default();

    for image_count in [8, 100, 1000].iter() {
        let (store, _) = store_with_products(*image_count);
        group.throughput(Throughput::Elements(*image_count as u64));
        group.bench_with_input(
            BenchmarkId::new("last_page", image_count),
            image_count,
            |b, _| {
                b.iter(|| {
                    store
                        .product_images_page(&paginator, black_box(Some("999999")))
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_ledger_record_latency,
    bench_home_page_pagination
);
criterion_main!(benches);
