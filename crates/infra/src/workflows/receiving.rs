use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use stockledger_core::{DomainError, PurchaseOrderId, TenantId, WarehouseId};
use stockledger_inventory::{NewPurchaseOrder, PurchaseOrder, PurchaseOrderStatus};

use crate::ledger::{DocumentCheck, LedgerContext, LedgerError, LedgerResult, LedgerService, require};
use crate::locks::KeyedLocks;
use crate::storage::{Document, DocumentKind, DocumentStore};
use crate::warehouses::WarehouseDirectory;

/// Purchase-order lifecycle as far as stock is concerned: create, receive, cancel.
///
/// Operations on one order are serialized, and receipt re-checks the stored status
/// inside the ledger transaction, so a concurrent double receipt credits stock once.
/// Goods are only received into a registered, active warehouse.
#[derive(Clone)]
pub struct ReceivingWorkflow {
    ledger: LedgerService,
    warehouses: Arc<WarehouseDirectory>,
    locks: Arc<KeyedLocks<(TenantId, PurchaseOrderId)>>,
}

impl ReceivingWorkflow {
    pub fn new(
        ledger: LedgerService,
        warehouses: Arc<WarehouseDirectory>,
        locks: KeyedLocks<(TenantId, PurchaseOrderId)>,
    ) -> Self {
        Self {
            ledger,
            warehouses,
            locks: Arc::new(locks),
        }
    }

    pub async fn create_order(
        &self,
        ctx: &LedgerContext,
        new: NewPurchaseOrder,
    ) -> LedgerResult<PurchaseOrder> {
        let order = PurchaseOrder::create(PurchaseOrderId::new(), new, Utc::now())?;
        self.ledger
            .store_documents(ctx, &[encode(&order)?])
            .await?;
        info!(tenant_id = %ctx.tenant_id, order_id = %order.id, lines = order.lines.len(), "purchase order created");
        Ok(order)
    }

    pub async fn get(
        &self,
        ctx: &LedgerContext,
        id: PurchaseOrderId,
    ) -> LedgerResult<Option<PurchaseOrder>> {
        let document = self
            .ledger
            .storage()
            .get_document(ctx.tenant_id, DocumentKind::PurchaseOrder, *id.as_uuid())
            .await?;
        Ok(document.map(|d| d.decode()).transpose()?)
    }

    async fn load(&self, ctx: &LedgerContext, id: PurchaseOrderId) -> LedgerResult<PurchaseOrder> {
        let order = self.get(ctx, id).await?;
        Ok(require(order, || format!("purchase order {id}"))?)
    }

    /// Credit every line into `warehouse_id` and mark the order received.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id, order_id = %order_id, warehouse_id = %warehouse_id))]
    pub async fn receive(
        &self,
        ctx: &LedgerContext,
        order_id: PurchaseOrderId,
        warehouse_id: WarehouseId,
    ) -> LedgerResult<PurchaseOrder> {
        let warehouse = self.warehouses.get(ctx.tenant_id, warehouse_id).await?;
        let warehouse = require(warehouse, || format!("warehouse {warehouse_id}"))?;
        if !warehouse.is_active {
            return Err(DomainError::invalid_request(format!("warehouse {warehouse_id} is inactive")).into());
        }

        let _guard = self.locks.lock((ctx.tenant_id, order_id)).await?;

        let mut order = self.load(ctx, order_id).await?;
        let credits = order.receive(warehouse_id, Utc::now())?;

        let still_pending = |current: Option<&Document>| -> LedgerResult<()> {
            let stored: PurchaseOrder = require(current, || format!("purchase order {order_id}"))?.decode()?;
            if stored.status != PurchaseOrderStatus::Pending {
                return Err(LedgerError::Domain(DomainError::conflict(format!(
                    "purchase order {order_id} is no longer pending"
                ))));
            }
            Ok(())
        };

        self.ledger
            .execute(
                ctx,
                &credits,
                &[encode(&order)?],
                Some(DocumentCheck {
                    kind: DocumentKind::PurchaseOrder,
                    id: *order_id.as_uuid(),
                    check: &still_pending,
                }),
            )
            .await?;
        Ok(order)
    }

    pub async fn cancel(&self, ctx: &LedgerContext, order_id: PurchaseOrderId) -> LedgerResult<PurchaseOrder> {
        let _guard = self.locks.lock((ctx.tenant_id, order_id)).await?;

        let mut order = self.load(ctx, order_id).await?;
        order.cancel()?;
        self.ledger.store_documents(ctx, &[encode(&order)?]).await?;
        info!(tenant_id = %ctx.tenant_id, order_id = %order_id, "purchase order cancelled");
        Ok(order)
    }
}

fn encode(order: &PurchaseOrder) -> Result<Document, crate::storage::StorageError> {
    Document::encode(DocumentKind::PurchaseOrder, *order.id.as_uuid(), order)
}
