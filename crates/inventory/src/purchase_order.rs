//! Purchase orders, as far as receipt into stock needs them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ProductId, PurchaseOrderId, WarehouseId};

use crate::ledger::{CreditForReceipt, LedgerCommand};
use crate::movement::ReferenceId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Pending,
    Received,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub lines: Vec<PurchaseOrderLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub status: PurchaseOrderStatus,
    pub lines: Vec<PurchaseOrderLine>,
    pub created_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
    pub received_into: Option<WarehouseId>,
}

impl PurchaseOrder {
    pub fn create(
        id: PurchaseOrderId,
        new: NewPurchaseOrder,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if new.lines.is_empty() {
            return Err(DomainError::invalid_request(
                "purchase order must have at least one line",
            ));
        }
        if new.lines.iter().any(|l| l.quantity <= 0) {
            return Err(DomainError::invalid_request(
                "purchase order lines must have a positive quantity",
            ));
        }

        Ok(Self {
            id,
            status: PurchaseOrderStatus::Pending,
            lines: new.lines,
            created_at,
            received_at: None,
            received_into: None,
        })
    }

    fn ensure_pending(&self, action: &str) -> DomainResult<()> {
        if self.status != PurchaseOrderStatus::Pending {
            return Err(DomainError::conflict(format!(
                "cannot {action} purchase order {} in status {:?}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Mark the order received into `warehouse_id` and return one credit per line.
    ///
    /// The caller must persist the transitioned order in the same unit as the credits.
    pub fn receive(
        &mut self,
        warehouse_id: WarehouseId,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<LedgerCommand>> {
        self.ensure_pending("receive")?;

        let reference = ReferenceId::purchase_order(self.id);
        let credits = self
            .lines
            .iter()
            .map(|line| {
                LedgerCommand::CreditForReceipt(CreditForReceipt {
                    product_id: line.product_id,
                    warehouse_id,
                    quantity: line.quantity,
                    reference_id: reference.clone(),
                    reason: None,
                    occurred_at: at,
                })
            })
            .collect();

        self.status = PurchaseOrderStatus::Received;
        self.received_at = Some(at);
        self.received_into = Some(warehouse_id);
        Ok(credits)
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        self.ensure_pending("cancel")?;
        self.status = PurchaseOrderStatus::Cancelled;
        Ok(())
    }
}
