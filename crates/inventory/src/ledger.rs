//! Ledger decision logic.
//!
//! [`plan`] is the pure core of every ledger operation: given the stock rows touched by
//! a unit of work (loaded and locked by infrastructure) and the commands in that unit,
//! it either rejects the whole unit or returns the rows to write and the movements to
//! append. It never performs IO and never mutates its input, so a rejected unit leaves
//! nothing behind.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::{DomainError, DomainResult, MovementId, ProductId, UserId, WarehouseId};

use crate::movement::{MovementType, ReferenceId, StockMovement};
use crate::stock::{Stock, StockKey};

const MAX_REASON_LEN: usize = 500;
const DEFAULT_RECEIPT_REASON: &str = "Purchase Order Received";

/// Command: manual correction by a signed delta. Never floor-checked and never refused;
/// any delta (zero included) and any reason is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub delta: i64,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: move stock between two warehouses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStock {
    pub product_id: ProductId,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub quantity: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: consume stock for one invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductForSale {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub reference_id: ReferenceId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: add stock for one received purchase-order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditForReceipt {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub reference_id: ReferenceId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    Adjust(AdjustStock),
    Transfer(TransferStock),
    DeductForSale(DeductForSale),
    CreditForReceipt(CreditForReceipt),
}

impl LedgerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCommand::Adjust(_) => "adjust",
            LedgerCommand::Transfer(_) => "transfer",
            LedgerCommand::DeductForSale(_) => "deduct_for_sale",
            LedgerCommand::CreditForReceipt(_) => "credit_for_receipt",
        }
    }

    /// Stock rows this command reads and writes.
    pub fn touched_keys(&self) -> Vec<StockKey> {
        match self {
            LedgerCommand::Adjust(c) => vec![StockKey::new(c.product_id, c.warehouse_id)],
            LedgerCommand::Transfer(c) => vec![
                StockKey::new(c.product_id, c.from_warehouse_id),
                StockKey::new(c.product_id, c.to_warehouse_id),
            ],
            LedgerCommand::DeductForSale(c) => vec![StockKey::new(c.product_id, c.warehouse_id)],
            LedgerCommand::CreditForReceipt(c) => {
                vec![StockKey::new(c.product_id, c.warehouse_id)]
            }
        }
    }
}

/// Stock rows as loaded at the start of a unit of work.
///
/// A key that maps to `None` was looked up and has no row yet. Keys never inserted are
/// treated the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockSnapshot {
    rows: BTreeMap<StockKey, Option<Stock>>,
}

impl StockSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: StockKey, row: Option<Stock>) {
        self.rows.insert(key, row);
    }

    pub fn get(&self, key: &StockKey) -> Option<&Stock> {
        self.rows.get(key).and_then(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Metadata shared by every movement of one atomic unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OperationMeta {
    pub operation_id: Uuid,
    pub actor: Option<UserId>,
}

/// What a unit of work will persist: updated rows plus the movements explaining them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerPlan {
    /// Rows to upsert, ordered by [`StockKey`].
    pub stock: Vec<Stock>,
    /// Movements to append, in decision order.
    pub movements: Vec<StockMovement>,
}

impl LedgerPlan {
    /// Stock rows that end the unit below zero (only reachable through `Adjust`).
    pub fn negative_rows(&self) -> impl Iterator<Item = &Stock> {
        self.stock.iter().filter(|s| s.quantity < 0)
    }
}

/// Decide the effect of `commands`, applied in order, against `snapshot`.
///
/// Later commands observe the effects of earlier ones (two invoice lines for the same
/// product deduct cumulatively). The first rejected command rejects the whole unit.
pub fn plan(
    snapshot: &StockSnapshot,
    commands: &[LedgerCommand],
    meta: OperationMeta,
    mut next_id: impl FnMut() -> MovementId,
) -> DomainResult<LedgerPlan> {
    if commands.is_empty() {
        return Err(DomainError::invalid_request("a ledger unit needs at least one command"));
    }

    let mut work = Working {
        snapshot,
        changed: BTreeMap::new(),
        movements: Vec::new(),
        meta,
    };

    for command in commands {
        match command {
            LedgerCommand::Adjust(c) => work.adjust(c, &mut next_id)?,
            LedgerCommand::Transfer(c) => work.transfer(c, &mut next_id)?,
            LedgerCommand::DeductForSale(c) => work.deduct(c, &mut next_id)?,
            LedgerCommand::CreditForReceipt(c) => work.credit(c, &mut next_id)?,
        }
    }

    Ok(LedgerPlan {
        stock: work.changed.into_values().collect(),
        movements: work.movements,
    })
}

struct Working<'a> {
    snapshot: &'a StockSnapshot,
    changed: BTreeMap<StockKey, Stock>,
    movements: Vec<StockMovement>,
    meta: OperationMeta,
}

impl Working<'_> {
    fn current(&self, key: StockKey) -> Option<&Stock> {
        self.changed.get(&key).or_else(|| self.snapshot.get(&key))
    }

    fn apply_delta(&mut self, key: StockKey, delta: i64, at: DateTime<Utc>) -> DomainResult<()> {
        let mut row = self
            .current(key)
            .cloned()
            .unwrap_or_else(|| Stock::empty(key, at));
        row.quantity = row
            .quantity
            .checked_add(delta)
            .ok_or_else(|| DomainError::invalid_request("stock quantity overflow"))?;
        row.updated_at = at;
        self.changed.insert(key, row);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &mut self,
        id: MovementId,
        key: StockKey,
        quantity: i64,
        movement_type: MovementType,
        reason: String,
        reference_id: Option<ReferenceId>,
        at: DateTime<Utc>,
    ) {
        self.movements.push(StockMovement {
            id,
            product_id: key.product_id,
            warehouse_id: key.warehouse_id,
            quantity,
            movement_type,
            reason,
            reference_id,
            operation_id: self.meta.operation_id,
            created_at: at,
            created_by: self.meta.actor,
        });
    }

    /// Require at least `requested` units in an existing row.
    fn ensure_available(&self, key: StockKey, requested: i64) -> DomainResult<()> {
        let available = self.current(key).map(|s| s.quantity);
        match available {
            Some(q) if q >= requested => Ok(()),
            other => Err(DomainError::insufficient_stock(
                key.product_id,
                key.warehouse_id,
                other.unwrap_or(0),
                requested,
            )),
        }
    }

    fn adjust(
        &mut self,
        c: &AdjustStock,
        next_id: &mut impl FnMut() -> MovementId,
    ) -> DomainResult<()> {
        let reason = truncated_reason(&c.reason);

        let key = StockKey::new(c.product_id, c.warehouse_id);
        self.apply_delta(key, c.delta, c.occurred_at)?;
        self.record(
            next_id(),
            key,
            c.delta,
            MovementType::Adjustment,
            reason,
            None,
            c.occurred_at,
        );
        Ok(())
    }

    fn transfer(
        &mut self,
        c: &TransferStock,
        next_id: &mut impl FnMut() -> MovementId,
    ) -> DomainResult<()> {
        ensure_positive(c.quantity)?;
        if c.from_warehouse_id == c.to_warehouse_id {
            return Err(DomainError::invalid_request(
                "source and destination warehouses must be different",
            ));
        }
        let note = optional_reason(c.reason.as_deref())?;

        let from = StockKey::new(c.product_id, c.from_warehouse_id);
        let to = StockKey::new(c.product_id, c.to_warehouse_id);
        self.ensure_available(from, c.quantity)?;

        self.apply_delta(from, -c.quantity, c.occurred_at)?;
        self.apply_delta(to, c.quantity, c.occurred_at)?;

        self.record(
            next_id(),
            from,
            -c.quantity,
            MovementType::Transfer,
            with_note(format!("Transfer to warehouse {}", c.to_warehouse_id), note.as_deref()),
            Some(ReferenceId::warehouse(c.to_warehouse_id)),
            c.occurred_at,
        );
        self.record(
            next_id(),
            to,
            c.quantity,
            MovementType::Transfer,
            with_note(format!("Transfer from warehouse {}", c.from_warehouse_id), note.as_deref()),
            Some(ReferenceId::warehouse(c.from_warehouse_id)),
            c.occurred_at,
        );
        Ok(())
    }

    fn deduct(
        &mut self,
        c: &DeductForSale,
        next_id: &mut impl FnMut() -> MovementId,
    ) -> DomainResult<()> {
        ensure_positive(c.quantity)?;
        let reason = match optional_reason(c.reason.as_deref())? {
            Some(r) => r,
            None => format!("Sale {}", c.reference_id),
        };

        let key = StockKey::new(c.product_id, c.warehouse_id);
        self.ensure_available(key, c.quantity)?;
        self.apply_delta(key, -c.quantity, c.occurred_at)?;
        self.record(
            next_id(),
            key,
            -c.quantity,
            MovementType::Out,
            reason,
            Some(c.reference_id.clone()),
            c.occurred_at,
        );
        Ok(())
    }

    fn credit(
        &mut self,
        c: &CreditForReceipt,
        next_id: &mut impl FnMut() -> MovementId,
    ) -> DomainResult<()> {
        ensure_positive(c.quantity)?;
        let reason = optional_reason(c.reason.as_deref())?
            .unwrap_or_else(|| DEFAULT_RECEIPT_REASON.to_string());

        let key = StockKey::new(c.product_id, c.warehouse_id);
        self.apply_delta(key, c.quantity, c.occurred_at)?;
        self.record(
            next_id(),
            key,
            c.quantity,
            MovementType::In,
            reason,
            Some(c.reference_id.clone()),
            c.occurred_at,
        );
        Ok(())
    }
}

fn ensure_positive(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::invalid_request("quantity must be greater than zero"));
    }
    Ok(())
}

/// Adjustments always record; an over-long reason is cut rather than refused.
fn truncated_reason(reason: &str) -> String {
    reason.trim().chars().take(MAX_REASON_LEN).collect()
}

fn optional_reason(reason: Option<&str>) -> DomainResult<Option<String>> {
    let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    if reason.chars().count() > MAX_REASON_LEN {
        return Err(DomainError::invalid_request(format!(
            "reason exceeds {MAX_REASON_LEN} characters"
        )));
    }
    Ok(Some(reason.to_string()))
}

fn with_note(base: String, note: Option<&str>) -> String {
    match note {
        Some(n) => format!("{base}. {n}"),
        None => base,
    }
}
