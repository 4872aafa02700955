//! Ledger Service: the only writer of stock rows and movements.
//!
//! ## Execution flow
//!
//! ```text
//! commands
//!   ↓
//! 1. lock every touched (tenant, product, warehouse) key, ascending order
//!   ↓
//! 2. begin a storage transaction; load each row "for update"
//!   ↓
//! 3. decide with `stockledger_inventory::plan` (pure; may reject the whole unit)
//!   ↓
//! 4. stage rows, movements and collaborator documents; commit
//!   ↓
//! 5. release locks
//! ```
//!
//! Locks are held from load through commit, so the sufficiency check and the write of
//! the new quantity form one atomic read-modify-write per key.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use stockledger_core::{DomainError, DomainResult, MovementId, ProductId, TenantId, UserId, WarehouseId};
use stockledger_inventory::{
    AdjustStock, CreditForReceipt, DeductForSale, LedgerCommand, LedgerPlan, OperationMeta, Stock,
    StockKey, StockMovement, StockSnapshot, TransferStock, plan,
};

use crate::locks::{KeyedLocks, LockTimeout};
use crate::storage::{Document, DocumentKind, LedgerStorage, MovementLog, StockStore, StorageError};

/// Who is acting, and for which tenant. Passed explicitly into every call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LedgerContext {
    pub tenant_id: TenantId,
    pub actor: Option<UserId>,
}

impl LedgerContext {
    pub fn new(tenant_id: TenantId, actor: Option<UserId>) -> Self {
        Self { tenant_id, actor }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    LockTimeout(#[from] LockTimeout),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Audit of the replay invariant for one pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    /// Stored quantity (0 when no row exists).
    pub stock_quantity: i64,
    pub movement_sum: i64,
    pub movement_count: usize,
    pub consistent: bool,
}

/// A precondition on a collaborator document, checked inside the unit's transaction.
pub(crate) struct DocumentCheck<'a> {
    pub kind: DocumentKind,
    pub id: Uuid,
    pub check: &'a (dyn Fn(Option<&Document>) -> LedgerResult<()> + Send + Sync),
}

#[derive(Clone)]
pub struct LedgerService {
    storage: Arc<dyn LedgerStorage>,
    locks: Arc<KeyedLocks<(TenantId, StockKey)>>,
}

impl LedgerService {
    pub fn new(storage: Arc<dyn LedgerStorage>, lock_timeout: Duration) -> Self {
        Self {
            storage,
            locks: Arc::new(KeyedLocks::new(lock_timeout)),
        }
    }

    pub fn storage(&self) -> &Arc<dyn LedgerStorage> {
        &self.storage
    }

    #[instrument(
        skip(self, ctx, cmd),
        fields(
            tenant_id = %ctx.tenant_id,
            product_id = %cmd.product_id,
            warehouse_id = %cmd.warehouse_id,
            delta = cmd.delta
        )
    )]
    pub async fn adjust(&self, ctx: &LedgerContext, cmd: AdjustStock) -> LedgerResult<LedgerPlan> {
        self.apply_batch(ctx, vec![LedgerCommand::Adjust(cmd)]).await
    }

    #[instrument(
        skip(self, ctx, cmd),
        fields(
            tenant_id = %ctx.tenant_id,
            product_id = %cmd.product_id,
            from = %cmd.from_warehouse_id,
            to = %cmd.to_warehouse_id,
            quantity = cmd.quantity
        )
    )]
    pub async fn transfer(&self, ctx: &LedgerContext, cmd: TransferStock) -> LedgerResult<LedgerPlan> {
        self.apply_batch(ctx, vec![LedgerCommand::Transfer(cmd)]).await
    }

    #[instrument(
        skip(self, ctx, cmd),
        fields(
            tenant_id = %ctx.tenant_id,
            product_id = %cmd.product_id,
            warehouse_id = %cmd.warehouse_id,
            quantity = cmd.quantity,
            reference_id = %cmd.reference_id
        )
    )]
    pub async fn deduct_for_sale(
        &self,
        ctx: &LedgerContext,
        cmd: DeductForSale,
    ) -> LedgerResult<LedgerPlan> {
        self.apply_batch(ctx, vec![LedgerCommand::DeductForSale(cmd)]).await
    }

    #[instrument(
        skip(self, ctx, cmd),
        fields(
            tenant_id = %ctx.tenant_id,
            product_id = %cmd.product_id,
            warehouse_id = %cmd.warehouse_id,
            quantity = cmd.quantity,
            reference_id = %cmd.reference_id
        )
    )]
    pub async fn credit_for_receipt(
        &self,
        ctx: &LedgerContext,
        cmd: CreditForReceipt,
    ) -> LedgerResult<LedgerPlan> {
        self.apply_batch(ctx, vec![LedgerCommand::CreditForReceipt(cmd)]).await
    }

    /// Apply `commands` as one atomic unit: all of them commit or none do.
    pub async fn apply_batch(
        &self,
        ctx: &LedgerContext,
        commands: Vec<LedgerCommand>,
    ) -> LedgerResult<LedgerPlan> {
        self.execute(ctx, &commands, &[], None).await
    }

    pub(crate) async fn execute(
        &self,
        ctx: &LedgerContext,
        commands: &[LedgerCommand],
        documents: &[Document],
        precondition: Option<DocumentCheck<'_>>,
    ) -> LedgerResult<LedgerPlan> {
        let kinds: Vec<&'static str> = commands.iter().map(|c| c.name()).collect();
        let result = self.execute_inner(ctx, commands, documents, precondition).await;

        match &result {
            Ok(committed) => {
                info!(
                    tenant_id = %ctx.tenant_id,
                    commands = ?kinds,
                    movements = committed.movements.len(),
                    "ledger unit committed"
                );
                for row in committed.negative_rows() {
                    warn!(
                        tenant_id = %ctx.tenant_id,
                        product_id = %row.product_id,
                        warehouse_id = %row.warehouse_id,
                        quantity = row.quantity,
                        "stock driven below zero by adjustment"
                    );
                }
            }
            Err(LedgerError::Domain(e)) => {
                debug!(tenant_id = %ctx.tenant_id, commands = ?kinds, code = e.code(), error = %e, "ledger unit rejected");
            }
            Err(LedgerError::LockTimeout(e)) => {
                warn!(tenant_id = %ctx.tenant_id, commands = ?kinds, error = %e, "ledger unit timed out waiting for locks");
            }
            Err(LedgerError::Storage(e)) => {
                error!(tenant_id = %ctx.tenant_id, commands = ?kinds, error = %e, "ledger unit failed in storage");
            }
        }
        result
    }

    async fn execute_inner(
        &self,
        ctx: &LedgerContext,
        commands: &[LedgerCommand],
        documents: &[Document],
        precondition: Option<DocumentCheck<'_>>,
    ) -> LedgerResult<LedgerPlan> {
        if commands.is_empty() {
            return Err(DomainError::invalid_request("a ledger unit needs at least one command").into());
        }

        let keys = commands
            .iter()
            .flat_map(|c| c.touched_keys())
            .map(|k| (ctx.tenant_id, k));
        let guard = self.locks.lock_all(keys).await?;

        let mut tx = self.storage.begin(ctx.tenant_id).await?;

        if let Some(pre) = precondition {
            let current = tx.get_document_for_update(pre.kind, pre.id).await?;
            (pre.check)(current.as_ref())?;
        }

        let mut snapshot = StockSnapshot::new();
        for (_, key) in guard.keys() {
            let row = tx.get_for_update(*key).await?;
            snapshot.insert(*key, row);
        }

        let meta = OperationMeta {
            operation_id: Uuid::now_v7(),
            actor: ctx.actor,
        };
        let committed = plan(&snapshot, commands, meta, MovementId::new)?;

        for row in &committed.stock {
            tx.upsert(row).await?;
        }
        for movement in &committed.movements {
            tx.append(movement).await?;
        }
        for document in documents {
            tx.put_document(document).await?;
        }
        tx.commit().await?;

        drop(guard);
        Ok(committed)
    }

    /// Persist collaborator documents that cause no movement.
    pub(crate) async fn store_documents(
        &self,
        ctx: &LedgerContext,
        documents: &[Document],
    ) -> LedgerResult<()> {
        let mut tx = self.storage.begin(ctx.tenant_id).await?;
        for document in documents {
            tx.put_document(document).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn stock(
        &self,
        ctx: &LedgerContext,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> LedgerResult<Option<Stock>> {
        Ok(self
            .storage
            .get(ctx.tenant_id, StockKey::new(product_id, warehouse_id))
            .await?)
    }

    pub async fn stock_for_product(
        &self,
        ctx: &LedgerContext,
        product_id: ProductId,
    ) -> LedgerResult<Vec<Stock>> {
        Ok(self.storage.list_for_product(ctx.tenant_id, product_id).await?)
    }

    pub async fn movements(
        &self,
        ctx: &LedgerContext,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> LedgerResult<Vec<StockMovement>> {
        Ok(self
            .storage
            .list_for(ctx.tenant_id, StockKey::new(product_id, warehouse_id))
            .await?)
    }

    /// Low-stock report: rows at or below `threshold`.
    pub async fn stock_below(&self, ctx: &LedgerContext, threshold: i64) -> LedgerResult<Vec<Stock>> {
        Ok(self.storage.list_at_or_below(ctx.tenant_id, threshold).await?)
    }

    /// Compare a stored quantity with the sum of its movements.
    ///
    /// Reads under the pair's lock so an in-flight unit cannot split the comparison.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, product_id = %product_id, warehouse_id = %warehouse_id))]
    pub async fn verify_replay(
        &self,
        ctx: &LedgerContext,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> LedgerResult<ReplayReport> {
        let key = StockKey::new(product_id, warehouse_id);
        let _guard = self.locks.lock((ctx.tenant_id, key)).await?;

        let stock_quantity = self
            .storage
            .get(ctx.tenant_id, key)
            .await?
            .map(|s| s.quantity)
            .unwrap_or(0);
        let movements = self.storage.list_for(ctx.tenant_id, key).await?;
        let movement_sum = movements.iter().map(|m| m.quantity).sum();

        let report = ReplayReport {
            product_id,
            warehouse_id,
            stock_quantity,
            movement_sum,
            movement_count: movements.len(),
            consistent: stock_quantity == movement_sum,
        };
        if !report.consistent {
            error!(
                stock_quantity,
                movement_sum,
                "stock row disagrees with its movement log"
            );
        }
        Ok(report)
    }
}

/// Helper for workflows: map a missing document to `NotFound`.
pub(crate) fn require<T>(value: Option<T>, what: impl FnOnce() -> String) -> DomainResult<T> {
    value.ok_or_else(|| DomainError::not_found(what()))
}
