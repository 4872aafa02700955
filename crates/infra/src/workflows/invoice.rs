use chrono::Utc;
use tracing::instrument;

use stockledger_core::InvoiceId;
use stockledger_inventory::{Invoice, NewInvoice};

use crate::ledger::{LedgerContext, LedgerResult, LedgerService};
use crate::storage::{Document, DocumentKind, DocumentStore};

/// Invoice creation: one `DeductForSale` per line, invoice persisted in the same unit.
#[derive(Clone)]
pub struct InvoiceWorkflow {
    ledger: LedgerService,
}

impl InvoiceWorkflow {
    pub fn new(ledger: LedgerService) -> Self {
        Self { ledger }
    }

    #[instrument(
        skip(self, ctx, new),
        fields(tenant_id = %ctx.tenant_id, warehouse_id = %new.warehouse_id, lines = new.lines.len())
    )]
    pub async fn create(&self, ctx: &LedgerContext, new: NewInvoice) -> LedgerResult<Invoice> {
        let invoice = Invoice::issue(InvoiceId::new(), new, Utc::now(), ctx.actor)?;
        let document = Document::encode(DocumentKind::Invoice, *invoice.id.as_uuid(), &invoice)?;

        self.ledger
            .execute(ctx, &invoice.deductions(), &[document], None)
            .await?;
        Ok(invoice)
    }

    pub async fn get(&self, ctx: &LedgerContext, id: InvoiceId) -> LedgerResult<Option<Invoice>> {
        let document = self
            .ledger
            .storage()
            .get_document(ctx.tenant_id, DocumentKind::Invoice, *id.as_uuid())
            .await?;
        Ok(document.map(|d| d.decode()).transpose()?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use stockledger_core::{DomainError, ProductId, TenantId, WarehouseId};
    use stockledger_inventory::{AdjustStock, InvoiceLine, MovementType, ReferenceId};

    use super::*;
    use crate::ledger::LedgerError;
    use crate::storage::InMemoryLedgerStorage;

    fn setup() -> (LedgerService, InvoiceWorkflow, LedgerContext) {
        let ledger = LedgerService::new(Arc::new(InMemoryLedgerStorage::new()), Duration::from_secs(5));
        let flow = InvoiceWorkflow::new(ledger.clone());
        (ledger, flow, LedgerContext::new(TenantId::new(), None))
    }

    async fn stock_up(ledger: &LedgerService, ctx: &LedgerContext, p: ProductId, w: WarehouseId, q: i64) {
        ledger
            .adjust(
                ctx,
                AdjustStock {
                    product_id: p,
                    warehouse_id: w,
                    delta: q,
                    reason: "init".to_string(),
                    occurred_at: Utc::now(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn invoice_deducts_each_line_and_is_persisted() {
        let (ledger, flow, ctx) = setup();
        let (p, w) = (ProductId::new(), WarehouseId::new());
        stock_up(&ledger, &ctx, p, w, 5).await;

        let invoice = flow
            .create(
                &ctx,
                NewInvoice {
                    customer_id: None,
                    warehouse_id: w,
                    lines: vec![InvoiceLine { product_id: p, quantity: 5 }],
                },
            )
            .await
            .unwrap();

        assert_eq!(ledger.stock(&ctx, p, w).await.unwrap().unwrap().quantity, 0);
        let log = ledger.movements(&ctx, p, w).await.unwrap();
        let out = log.iter().find(|m| m.movement_type == MovementType::Out).unwrap();
        assert_eq!(out.quantity, -5);
        assert_eq!(out.reference_id, Some(ReferenceId::invoice(invoice.id)));
        assert_eq!(out.reason, format!("Invoice {}", invoice.number));
        assert_eq!(flow.get(&ctx, invoice.id).await.unwrap(), Some(invoice));
    }

    #[tokio::test]
    async fn insufficient_line_persists_nothing() {
        let (ledger, flow, ctx) = setup();
        let (p, w) = (ProductId::new(), WarehouseId::new());
        stock_up(&ledger, &ctx, p, w, 3).await;

        let err = flow
            .create(
                &ctx,
                NewInvoice {
                    customer_id: None,
                    warehouse_id: w,
                    lines: vec![InvoiceLine { product_id: p, quantity: 5 }],
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::InsufficientStock { available: 3, requested: 5, .. })
        ));
        assert_eq!(ledger.stock(&ctx, p, w).await.unwrap().unwrap().quantity, 3);
        assert_eq!(ledger.movements(&ctx, p, w).await.unwrap().len(), 1);
        let invoices = ledger
            .storage()
            .list_documents(ctx.tenant_id, DocumentKind::Invoice)
            .await
            .unwrap();
        assert!(invoices.is_empty());
    }

    #[tokio::test]
    async fn empty_invoice_is_invalid() {
        let (_ledger, flow, ctx) = setup();
        let err = flow
            .create(
                &ctx,
                NewInvoice {
                    customer_id: None,
                    warehouse_id: WarehouseId::new(),
                    lines: vec![],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Domain(DomainError::InvalidRequest(_))));
    }
}
