//! Transactional inventory ledger.
//!
//! `record` runs one stock-entry create/edit as a single unit of work:
//!
//! 1. lock the product row (missing product → `NotFound`)
//! 2. load the persisted entry for edits (missing entry → `StaleReference`)
//! 3. reconcile with `storefront_inventory::plan`
//! 4. write the product quantity, then the entry
//!
//! Any error in steps 1–4 rolls the whole unit back.

use tracing::{info, warn};

use storefront_core::Entity;
use storefront_inventory::{EntryWrite, LedgerPlan, RecordStockEntry, StockEntry, plan};

use crate::error::{StoreError, StoreResult};
use crate::store::{LedgerTx, UnitOfWork};

/// Result of a recorded stock entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub entry: StockEntry,
    pub on_hand_before: i64,
    pub on_hand_after: i64,
}

/// Inventory ledger over any store that offers scoped transactions.
#[derive(Debug, Clone)]
pub struct InventoryLedger<S> {
    store: S,
}

impl<S> InventoryLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: UnitOfWork> InventoryLedger<S> {
    /// Create or edit a stock entry and adjust the product's on-hand count.
    pub fn record(&self, command: &RecordStockEntry) -> StoreResult<Recorded> {
        let result = self.store.atomically(|tx| apply(tx, command));
        log_outcome(command, &result);
        result
    }
}

/// One log line per ledger call, shared by every adapter.
pub(crate) fn log_outcome(command: &RecordStockEntry, result: &StoreResult<Recorded>) {
    match result {
        Ok(recorded) => info!(
            product_id = %command.product_id,
            stock_entry_id = %recorded.entry.id(),
            edit = command.is_edit(),
            on_hand_before = recorded.on_hand_before,
            on_hand_after = recorded.on_hand_after,
            "stock entry recorded"
        ),
        Err(err) => warn!(
            product_id = %command.product_id,
            edit = command.is_edit(),
            error = %err,
            "stock entry rejected"
        ),
    }
}

/// The ledger steps against an open transaction.
pub fn apply(tx: &mut dyn LedgerTx, command: &RecordStockEntry) -> StoreResult<Recorded> {
    let product = tx
        .lock_product(command.product_id)?
        .ok_or_else(|| StoreError::not_found("product", command.product_id))?;

    let previous = match command.entry_id {
        Some(id) => tx.stock_entry(id)?,
        None => None,
    };

    let LedgerPlan {
        product_id,
        on_hand_before,
        on_hand_after,
        entry,
        ..
    } = plan(command, product.quantity(), previous.as_ref())?;

    tx.set_product_quantity(product_id, on_hand_after)?;
    let entry = match entry {
        EntryWrite::Insert(new) => tx.insert_stock_entry(new)?,
        EntryWrite::Update(entry) => {
            tx.update_stock_entry(&entry)?;
            entry
        }
    };

    Ok(Recorded {
        entry,
        on_hand_before,
        on_hand_after,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::store::InMemoryStore;
    use storefront_catalog::{NewCategory, NewProduct};
    use storefront_core::{DomainError, Money, ProductId, StockEntryId};

    fn setup(quantity: i64) -> (InventoryLedger<Arc<InMemoryStore>>, ProductId) {
        let store = Arc::new(InMemoryStore::new());
        let category = store
            .create_category(NewCategory {
                name: "Gadgets".to_string(),
                title: String::new(),
                image: "category_img/gadgets.png".to_string(),
            })
            .unwrap();
        let product = store
            .create_product(NewProduct {
                category_id: category.id(),
                name: "Widget".to_string(),
                quantity,
                price: Money::from_minor(9_99),
                description: String::new(),
            })
            .unwrap();
        (InventoryLedger::new(store), product.id())
    }

    fn on_hand(ledger: &InventoryLedger<Arc<InMemoryStore>>, id: ProductId) -> i64 {
        ledger.store().product(id).unwrap().quantity()
    }

    #[test]
    fn widget_scenario() {
        let (ledger, widget) = setup(10);

        let created = ledger
            .record(&RecordStockEntry::create(widget, 5, Utc::now()).with_notes("delivery"))
            .unwrap();
        assert_eq!(on_hand(&ledger, widget), 15);
        assert_eq!(created.entry.prior_quantity, 10);
        assert_eq!(created.on_hand_before, 10);

        let edited = ledger
            .record(&RecordStockEntry::edit(created.entry.id, widget, 2, Utc::now()))
            .unwrap();
        assert_eq!(on_hand(&ledger, widget), 12);
        assert_eq!(edited.entry.id, created.entry.id);
        assert_eq!(edited.entry.prior_quantity, 5);
        assert_eq!(edited.entry.notes, "delivery");

        let history = ledger.store().stock_entries_for(widget).unwrap();
        assert_eq!(history, vec![edited.entry]);
    }

    #[test]
    fn missing_product_is_reported_and_nothing_is_written() {
        let (ledger, widget) = setup(10);
        let ghost = ProductId::new(widget.get() + 100);

        let err = ledger
            .record(&RecordStockEntry::create(ghost, 5, Utc::now()))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(ledger.store().stock_entries_for(ghost).unwrap().is_empty());
    }

    #[test]
    fn edit_of_vanished_entry_is_stale_and_leaves_quantity_alone() {
        let (ledger, widget) = setup(10);

        let err = ledger
            .record(&RecordStockEntry::edit(StockEntryId::new(77), widget, 3, Utc::now()))
            .unwrap_err();
        assert!(err.is_stale_reference());
        assert_eq!(on_hand(&ledger, widget), 10);
        assert!(ledger.store().stock_entries_for(widget).unwrap().is_empty());
    }

    #[test]
    fn entry_deleted_with_its_product_then_edited_is_stale() {
        let (ledger, widget) = setup(10);
        let created = ledger
            .record(&RecordStockEntry::create(widget, 1, Utc::now()))
            .unwrap();
        ledger.store().delete_product(widget).unwrap();

        let err = ledger
            .record(&RecordStockEntry::edit(created.entry.id, widget, 4, Utc::now()))
            .unwrap_err();
        // The product lock fails first.
        assert!(err.is_not_found());
    }

    #[test]
    fn negative_stock_rolls_back() {
        let (ledger, widget) = setup(3);
        let err = ledger
            .record(&RecordStockEntry::create(widget, -4, Utc::now()))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(DomainError::InvariantViolation(_))
        ));
        assert_eq!(on_hand(&ledger, widget), 3);
        assert!(ledger.store().stock_entries_for(widget).unwrap().is_empty());
    }

    #[test]
    fn concurrent_entries_on_one_product_do_not_lose_updates() {
        let (ledger, widget) = setup(0);
        let ledger = Arc::new(ledger);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        ledger
                            .record(&RecordStockEntry::create(widget, 1, Utc::now()))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(on_hand(&ledger, widget), 200);
        assert_eq!(ledger.store().stock_entries_for(widget).unwrap().len(), 200);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;
        use storefront_inventory::net_change;

        proptest! {
            #[test]
            fn on_hand_tracks_accepted_entries(
                initial in 0i64..50,
                deltas in prop::collection::vec(-20i64..20, 1..30),
            ) {
                let (ledger, widget) = setup(initial);
                let mut expected = initial;
                for delta in deltas {
                    let result =
                        ledger.record(&RecordStockEntry::create(widget, delta, Utc::now()));
                    if expected + delta < 0 {
                        prop_assert!(result.is_err());
                    } else {
                        prop_assert!(result.is_ok());
                        expected += delta;
                    }
                    prop_assert_eq!(on_hand(&ledger, widget), expected);
                }
                let history = ledger.store().stock_entries_for(widget).unwrap();
                prop_assert_eq!(initial + net_change(&history), expected);
            }
        }
    }
}
