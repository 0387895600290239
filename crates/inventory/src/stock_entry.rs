use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Entity, ProductId, StockEntryId};

/// A stock entry that has been planned but not yet assigned an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockEntry {
    pub product_id: ProductId,
    pub quantity: i64,
    pub prior_quantity: i64,
    pub notes: String,
    pub recorded_at: DateTime<Utc>,
}

/// Ledger event: one delivery or adjustment of a product's stock.
///
/// `quantity` is the signed delta entered by the operator. `prior_quantity`
/// is the audit snapshot taken when the entry was last written: the product's
/// on-hand count for a new entry, the entry's previous requested quantity
/// after an edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub id: StockEntryId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub prior_quantity: i64,
    pub notes: String,
    pub recorded_at: DateTime<Utc>,
}

impl StockEntry {
    pub fn from_new(id: StockEntryId, new: NewStockEntry) -> Self {
        Self {
            id,
            product_id: new.product_id,
            quantity: new.quantity,
            prior_quantity: new.prior_quantity,
            notes: new.notes,
            recorded_at: new.recorded_at,
        }
    }
}

impl Entity for StockEntry {
    type Id = StockEntryId;

    fn id(&self) -> StockEntryId {
        self.id
    }
}
