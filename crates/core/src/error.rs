//! Domain error model.

use thiserror::Error;

use crate::id::{ProductId, WarehouseId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Ledger-level error taxonomy.
///
/// Keep this focused on deterministic, business/domain failures. Every variant is
/// recoverable by the caller. Storage and transport failures belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or self-referential input (non-positive quantity, same warehouse, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The operation would drive a constrained stock row below zero.
    #[error(
        "insufficient stock for product {product_id} in warehouse {warehouse_id} \
         (available: {available}, requested: {requested})"
    )]
    InsufficientStock {
        product_id: ProductId,
        warehouse_id: WarehouseId,
        available: i64,
        requested: i64,
    },

    /// A referenced entity is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The referenced entity is in a state that does not allow the operation.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn insufficient_stock(
        product_id: ProductId,
        warehouse_id: WarehouseId,
        available: i64,
        requested: i64,
    ) -> Self {
        Self::InsufficientStock {
            product_id,
            warehouse_id,
            available,
            requested,
        }
    }

    /// Stable machine-readable code (used by the HTTP layer).
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidRequest(_) => "invalid_request",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::NotFound(_) => "not_found",
            DomainError::Conflict(_) => "conflict",
        }
    }
}
