//! Inventory domain module: the multi-warehouse stock ledger.
//!
//! This crate contains the business rules for stock movements, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Infrastructure loads the
//! current stock rows, asks [`plan`] what should happen, and persists the result.

pub mod invoice;
pub mod ledger;
pub mod movement;
pub mod product;
pub mod purchase_order;
pub mod stock;
pub mod warehouse;

pub use invoice::{Invoice, InvoiceLine, NewInvoice};
pub use ledger::{
    AdjustStock, CreditForReceipt, DeductForSale, LedgerCommand, LedgerPlan, OperationMeta,
    StockSnapshot, TransferStock, plan,
};
pub use movement::{MovementType, ReferenceId, StockMovement};
pub use product::{INITIAL_STOCK_REASON, NewProduct, plan_initial_stock};
pub use purchase_order::{NewPurchaseOrder, PurchaseOrder, PurchaseOrderLine, PurchaseOrderStatus};
pub use stock::{Stock, StockKey};
pub use warehouse::{NewWarehouse, Warehouse, primary_warehouse};
