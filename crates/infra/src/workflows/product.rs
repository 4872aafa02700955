use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use stockledger_core::{ProductId, WarehouseId};
use stockledger_inventory::{LedgerCommand, NewProduct, plan_initial_stock};

use crate::ledger::{LedgerContext, LedgerResult, LedgerService};
use crate::storage::{Document, DocumentKind};
use crate::warehouses::WarehouseDirectory;

/// What the ledger remembers about a product: its initial stock and where it went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub initial_stock: i64,
    /// `None` when there was nothing to seed or no primary active warehouse.
    pub seeded_warehouse_id: Option<WarehouseId>,
    pub created_at: DateTime<Utc>,
}

/// Product creation: seeds initial stock into the primary active warehouse.
#[derive(Clone)]
pub struct ProductOnboarding {
    ledger: LedgerService,
    warehouses: Arc<WarehouseDirectory>,
}

impl ProductOnboarding {
    pub fn new(ledger: LedgerService, warehouses: Arc<WarehouseDirectory>) -> Self {
        Self { ledger, warehouses }
    }

    pub async fn seed(&self, ctx: &LedgerContext, new: NewProduct) -> LedgerResult<ProductRecord> {
        new.validate()?;

        let id = ProductId::new();
        let now = Utc::now();
        let warehouses = self.warehouses.list(ctx.tenant_id).await?;
        let seed = plan_initial_stock(id, new.initial_stock, &warehouses, now);

        let record = ProductRecord {
            id,
            name: new.name.trim().to_string(),
            initial_stock: new.initial_stock,
            seeded_warehouse_id: seed.as_ref().and_then(|cmd| match cmd {
                LedgerCommand::Adjust(a) => Some(a.warehouse_id),
                _ => None,
            }),
            created_at: now,
        };
        let document = Document::encode(DocumentKind::Product, *id.as_uuid(), &record)?;

        match seed {
            Some(cmd) => {
                self.ledger.execute(ctx, &[cmd], &[document], None).await?;
            }
            None => {
                if new.initial_stock > 0 {
                    warn!(
                        tenant_id = %ctx.tenant_id,
                        product_id = %id,
                        initial_stock = new.initial_stock,
                        "no primary active warehouse; initial stock not recorded in the ledger"
                    );
                }
                self.ledger.store_documents(ctx, &[document]).await?;
            }
        }

        info!(tenant_id = %ctx.tenant_id, product_id = %id, "product created");
        Ok(record)
    }
}
