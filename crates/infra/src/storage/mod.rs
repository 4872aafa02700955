//! Durable storage boundary for the ledger: the Stock Store, the Movement Log and the
//! collaborator documents written alongside them.
//!
//! Reads go straight to a [`LedgerStorage`] backend. Writes only happen through a
//! [`LedgerTx`], which stages stock rows, movements and documents and applies all of
//! them at [`LedgerTx::commit`] or none of them (dropping an uncommitted transaction
//! discards its writes).

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use stockledger_core::{ProductId, TenantId};
use stockledger_inventory::{Stock, StockKey, StockMovement};

pub use in_memory::InMemoryLedgerStorage;
pub use postgres::PostgresLedgerStorage;

/// Storage I/O failure. Never part of the ledger's business error taxonomy.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),
}

/// Kind of collaborator record persisted next to the movements it causes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentKind {
    Invoice,
    PurchaseOrder,
    Product,
    Warehouse,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::PurchaseOrder => "purchase_order",
            DocumentKind::Product => "product",
            DocumentKind::Warehouse => "warehouse",
        }
    }
}

/// A collaborator record as stored: kind, id and JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub kind: DocumentKind,
    pub id: Uuid,
    pub body: JsonValue,
}

impl Document {
    pub fn encode<T: Serialize>(kind: DocumentKind, id: Uuid, value: &T) -> Result<Self, StorageError> {
        let body = serde_json::to_value(value).map_err(|e| {
            StorageError::Corrupt(format!("{} {id} failed to serialize: {e}", kind.as_str()))
        })?;
        Ok(Self { kind, id, body })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        serde_json::from_value(self.body.clone()).map_err(|e| {
            StorageError::Corrupt(format!("{} {} failed to deserialize: {e}", self.kind.as_str(), self.id))
        })
    }
}

/// Read side of the Stock Store.
#[async_trait]
pub trait StockStore: Send + Sync {
    async fn get(&self, tenant_id: TenantId, key: StockKey) -> Result<Option<Stock>, StorageError>;

    /// Every warehouse row for one product, ordered by warehouse id.
    async fn list_for_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Vec<Stock>, StorageError>;

    /// Rows with `quantity <= threshold`, ordered by key.
    async fn list_at_or_below(
        &self,
        tenant_id: TenantId,
        threshold: i64,
    ) -> Result<Vec<Stock>, StorageError>;
}

/// Read side of the Movement Log.
#[async_trait]
pub trait MovementLog: Send + Sync {
    /// Movements for one pair ordered by `created_at`, ties in append order.
    async fn list_for(
        &self,
        tenant_id: TenantId,
        key: StockKey,
    ) -> Result<Vec<StockMovement>, StorageError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(
        &self,
        tenant_id: TenantId,
        kind: DocumentKind,
        id: Uuid,
    ) -> Result<Option<Document>, StorageError>;

    async fn list_documents(
        &self,
        tenant_id: TenantId,
        kind: DocumentKind,
    ) -> Result<Vec<Document>, StorageError>;
}

/// A complete ledger backend.
#[async_trait]
pub trait LedgerStorage: StockStore + MovementLog + DocumentStore {
    /// Open a tenant-scoped unit of work.
    async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn LedgerTx>, StorageError>;
}

/// One atomic unit of work against a single tenant.
#[async_trait]
pub trait LedgerTx: Send {
    /// Read a stock row and hold it for the rest of the unit.
    ///
    /// Backends shared between processes take a row lock here, creating the row first
    /// when it does not exist yet so first-touch pairs are locked too. The return value
    /// still reports such a row as absent.
    async fn get_for_update(&mut self, key: StockKey) -> Result<Option<Stock>, StorageError>;

    /// Create the row if absent, otherwise overwrite quantity and timestamp.
    async fn upsert(&mut self, stock: &Stock) -> Result<(), StorageError>;

    async fn append(&mut self, movement: &StockMovement) -> Result<(), StorageError>;

    async fn get_document_for_update(
        &mut self,
        kind: DocumentKind,
        id: Uuid,
    ) -> Result<Option<Document>, StorageError>;

    async fn put_document(&mut self, document: &Document) -> Result<(), StorageError>;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;
}
