//! `stockledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers and the ledger's error taxonomy.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{
    CustomerId, InvoiceId, MovementId, ProductId, PurchaseOrderId, TenantId, UserId, WarehouseId,
};
