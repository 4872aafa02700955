use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{CustomerId, DomainError, DomainResult, InvoiceId, ProductId, UserId, WarehouseId};

use crate::ledger::{DeductForSale, LedgerCommand};
use crate::movement::ReferenceId;

/// One sold product line. Pricing is not modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Invoice creation request. Every line is fulfilled from `warehouse_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoice {
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<InvoiceLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    /// Human-facing number, `INV-YYYYMMDD-XXXX`.
    pub number: String,
    pub customer_id: Option<CustomerId>,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<InvoiceLine>,
    pub issued_at: DateTime<Utc>,
    pub issued_by: Option<UserId>,
}

impl Invoice {
    /// Validate a request and build the invoice it describes.
    pub fn issue(
        id: InvoiceId,
        new: NewInvoice,
        issued_at: DateTime<Utc>,
        issued_by: Option<UserId>,
    ) -> DomainResult<Self> {
        if new.lines.is_empty() {
            return Err(DomainError::invalid_request("invoice must have at least one line"));
        }
        if let Some(line) = new.lines.iter().find(|l| l.quantity <= 0) {
            return Err(DomainError::invalid_request(format!(
                "invoice line for product {} must have a positive quantity",
                line.product_id
            )));
        }

        Ok(Self {
            id,
            number: invoice_number(id, issued_at),
            customer_id: new.customer_id,
            warehouse_id: new.warehouse_id,
            lines: new.lines,
            issued_at,
            issued_by,
        })
    }

    /// One `DeductForSale` per line, in line order.
    pub fn deductions(&self) -> Vec<LedgerCommand> {
        let reference = ReferenceId::invoice(self.id);
        self.lines
            .iter()
            .map(|line| {
                LedgerCommand::DeductForSale(DeductForSale {
                    product_id: line.product_id,
                    warehouse_id: self.warehouse_id,
                    quantity: line.quantity,
                    reference_id: reference.clone(),
                    reason: Some(format!("Invoice {}", self.number)),
                    occurred_at: self.issued_at,
                })
            })
            .collect()
    }
}

// Suffix comes from the random tail of the v7 id, so numbers are stable per invoice.
fn invoice_number(id: InvoiceId, at: DateTime<Utc>) -> String {
    let bytes = id.as_uuid().as_bytes();
    format!(
        "INV-{}-{:02X}{:02X}",
        at.format("%Y%m%d"),
        bytes[14],
        bytes[15]
    )
}
