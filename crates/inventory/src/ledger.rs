//! Stock-entry reconciliation.
//!
//! A stock entry's `quantity` is a signed delta in both directions of use:
//!
//! - **create**: the delta is added to the product's on-hand count, and the
//!   count before the change is snapshotted into `prior_quantity`;
//! - **edit**: the delta previously applied is swapped for the new one, so
//!   the product moves by `new - previous`; `prior_quantity` becomes the
//!   entry's previous requested quantity.
//!
//! [`plan`] is a pure function of (command, locked on-hand count, persisted
//! entry). Storage adapters lock the product row, load the entry, call
//! `plan`, then write the product and the entry in that order in one
//! transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, ProductId, StockEntryId};

use crate::stock_entry::{NewStockEntry, StockEntry};

/// Command: create (no `entry_id`) or edit (with `entry_id`) a stock entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStockEntry {
    pub entry_id: Option<StockEntryId>,
    pub product_id: ProductId,
    pub quantity: i64,
    /// `None` keeps the existing notes on edit and means "no notes" on create.
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl RecordStockEntry {
    pub fn create(product_id: ProductId, quantity: i64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            entry_id: None,
            product_id,
            quantity,
            notes: None,
            occurred_at,
        }
    }

    pub fn edit(
        entry_id: StockEntryId,
        product_id: ProductId,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: Some(entry_id),
            product_id,
            quantity,
            notes: None,
            occurred_at,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn is_edit(&self) -> bool {
        self.entry_id.is_some()
    }
}

/// How the entry row itself must be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryWrite {
    Insert(NewStockEntry),
    Update(StockEntry),
}

/// Outcome of reconciling one command against the locked product count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPlan {
    pub product_id: ProductId,
    /// Net change applied to the product's on-hand count.
    pub delta: i64,
    pub on_hand_before: i64,
    pub on_hand_after: i64,
    pub entry: EntryWrite,
}

/// Reconcile a create/edit command.
///
/// `previous` must be the persisted entry for `command.entry_id` (read inside
/// the same transaction), or `None` when the command creates an entry or the
/// entry could not be found.
pub fn plan(
    command: &RecordStockEntry,
    on_hand: i64,
    previous: Option<&StockEntry>,
) -> DomainResult<LedgerPlan> {
    match (command.entry_id, previous) {
        (None, _) => plan_create(command, on_hand),
        (Some(entry_id), None) => Err(DomainError::stale("stock entry", entry_id)),
        (Some(entry_id), Some(previous)) => {
            if previous.id != entry_id {
                return Err(DomainError::invariant("stock entry id mismatch"));
            }
            plan_edit(command, on_hand, previous)
        }
    }
}

fn apply_delta(on_hand: i64, delta: i64) -> DomainResult<i64> {
    let after = on_hand
        .checked_add(delta)
        .ok_or_else(|| DomainError::invariant("stock quantity overflow"))?;
    if after < 0 {
        return Err(DomainError::invariant(format!(
            "stock cannot go negative (on hand {on_hand}, change {delta})"
        )));
    }
    Ok(after)
}

fn plan_create(command: &RecordStockEntry, on_hand: i64) -> DomainResult<LedgerPlan> {
    let on_hand_after = apply_delta(on_hand, command.quantity)?;
    Ok(LedgerPlan {
        product_id: command.product_id,
        delta: command.quantity,
        on_hand_before: on_hand,
        on_hand_after,
        entry: EntryWrite::Insert(NewStockEntry {
            product_id: command.product_id,
            quantity: command.quantity,
            prior_quantity: on_hand,
            notes: command.notes.clone().unwrap_or_default(),
            recorded_at: command.occurred_at,
        }),
    })
}

fn plan_edit(
    command: &RecordStockEntry,
    on_hand: i64,
    previous: &StockEntry,
) -> DomainResult<LedgerPlan> {
    if previous.product_id != command.product_id {
        return Err(DomainError::validation(format!(
            "stock entry {} belongs to product {}, cannot move it to product {}",
            previous.id, previous.product_id, command.product_id
        )));
    }

    let delta = command
        .quantity
        .checked_sub(previous.quantity)
        .ok_or_else(|| DomainError::invariant("stock quantity overflow"))?;
    let on_hand_after = apply_delta(on_hand, delta)?;

    let entry = StockEntry {
        id: previous.id,
        product_id: previous.product_id,
        quantity: command.quantity,
        prior_quantity: previous.quantity,
        notes: command
            .notes
            .clone()
            .unwrap_or_else(|| previous.notes.clone()),
        recorded_at: previous.recorded_at,
    };

    Ok(LedgerPlan {
        product_id: command.product_id,
        delta,
        on_hand_before: on_hand,
        on_hand_after,
        entry: EntryWrite::Update(entry),
    })
}

/// Net effect of a product's stock-entry history on its on-hand count.
pub fn net_change<'a>(entries: impl IntoIterator<Item = &'a StockEntry>) -> i64 {
    entries.into_iter().map(|e| e.quantity).sum()
}
