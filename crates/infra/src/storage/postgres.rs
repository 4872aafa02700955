//! Postgres-backed ledger storage.
//!
//! Every unit of work is one SQL transaction. Stock rows touched by a unit are locked
//! with `SELECT ... FOR UPDATE`; a first-touch pair is seeded with
//! `INSERT ... ON CONFLICT DO NOTHING` beforehand so the lock exists even when the row
//! did not. Units lock rows in ascending key order, so two processes sharing the
//! database cannot deadlock on opposite-direction transfers.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | `StorageError` |
//! |---|---|---|
//! | unique violation | `23505` | `Conflict` |
//! | serialization failure / deadlock | `40001` / `40P01` | `Conflict` |
//! | other database error | any | `Database` |
//! | pool closed / timed out, I/O | n/a | `Unavailable` |
//! | row decode | n/a | `Corrupt` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockledger_core::{MovementId, ProductId, TenantId, UserId, WarehouseId};
use stockledger_inventory::{MovementType, ReferenceId, Stock, StockKey, StockMovement};

use super::{
    Document, DocumentKind, DocumentStore, LedgerStorage, LedgerTx, MovementLog, StockStore,
    StorageError,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS stock (
        tenant_id UUID NOT NULL,
        product_id UUID NOT NULL,
        warehouse_id UUID NOT NULL,
        quantity BIGINT NOT NULL DEFAULT 0,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (tenant_id, product_id, warehouse_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_movements (
        seq BIGSERIAL PRIMARY KEY,
        id UUID NOT NULL UNIQUE,
        tenant_id UUID NOT NULL,
        product_id UUID NOT NULL,
        warehouse_id UUID NOT NULL,
        quantity BIGINT NOT NULL,
        movement_type TEXT NOT NULL,
        reason TEXT NOT NULL,
        reference_id TEXT NULL,
        operation_id UUID NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        created_by UUID NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_stock_movements_pair
        ON stock_movements (tenant_id, product_id, warehouse_id, created_at, seq)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ledger_documents (
        tenant_id UUID NOT NULL,
        kind TEXT NOT NULL,
        id UUID NOT NULL,
        body JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (tenant_id, kind, id)
    )
    "#,
];

#[derive(Debug, Clone)]
pub struct PostgresLedgerStorage {
    pool: PgPool,
}

impl PostgresLedgerStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

#[async_trait]
impl StockStore for PostgresLedgerStorage {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, key = %key), err)]
    async fn get(&self, tenant_id: TenantId, key: StockKey) -> Result<Option<Stock>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT product_id, warehouse_id, quantity, updated_at
            FROM stock
            WHERE tenant_id = $1 AND product_id = $2 AND warehouse_id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(key.product_id.as_uuid())
        .bind(key.warehouse_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_stock", e))?;

        row.as_ref().map(stock_from_row).transpose()
    }

    async fn list_for_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Vec<Stock>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, warehouse_id, quantity, updated_at
            FROM stock
            WHERE tenant_id = $1 AND product_id = $2
            ORDER BY warehouse_id ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_stock_for_product", e))?;

        rows.iter().map(stock_from_row).collect()
    }

    async fn list_at_or_below(
        &self,
        tenant_id: TenantId,
        threshold: i64,
    ) -> Result<Vec<Stock>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, warehouse_id, quantity, updated_at
            FROM stock
            WHERE tenant_id = $1 AND quantity <= $2
            ORDER BY product_id ASC, warehouse_id ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_low_stock", e))?;

        rows.iter().map(stock_from_row).collect()
    }
}

#[async_trait]
impl MovementLog for PostgresLedgerStorage {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, key = %key), err)]
    async fn list_for(
        &self,
        tenant_id: TenantId,
        key: StockKey,
    ) -> Result<Vec<StockMovement>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, warehouse_id, quantity, movement_type, reason,
                   reference_id, operation_id, created_at, created_by
            FROM stock_movements
            WHERE tenant_id = $1 AND product_id = $2 AND warehouse_id = $3
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(key.product_id.as_uuid())
        .bind(key.warehouse_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        rows.iter().map(movement_from_row).collect()
    }
}

#[async_trait]
impl DocumentStore for PostgresLedgerStorage {
    async fn get_document(
        &self,
        tenant_id: TenantId,
        kind: DocumentKind,
        id: Uuid,
    ) -> Result<Option<Document>, StorageError> {
        let row = sqlx::query(
            "SELECT body FROM ledger_documents WHERE tenant_id = $1 AND kind = $2 AND id = $3",
        )
        .bind(tenant_id.as_uuid())
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_document", e))?;

        row.map(|r| document_from_row(kind, id, &r)).transpose()
    }

    async fn list_documents(
        &self,
        tenant_id: TenantId,
        kind: DocumentKind,
    ) -> Result<Vec<Document>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, body FROM ledger_documents WHERE tenant_id = $1 AND kind = $2 ORDER BY id ASC",
        )
        .bind(tenant_id.as_uuid())
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_documents", e))?;

        rows.iter()
            .map(|r| {
                let id: Uuid = r.try_get("id").map_err(corrupt)?;
                document_from_row(kind, id, r)
            })
            .collect()
    }
}

#[async_trait]
impl LedgerStorage for PostgresLedgerStorage {
    async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn LedgerTx>, StorageError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTx { tx, tenant_id }))
    }
}

/// Dropping without `commit` rolls the SQL transaction back.
struct PostgresTx {
    tx: Transaction<'static, Postgres>,
    tenant_id: TenantId,
}

#[async_trait]
impl LedgerTx for PostgresTx {
    async fn get_for_update(&mut self, key: StockKey) -> Result<Option<Stock>, StorageError> {
        let seeded = sqlx::query(
            r#"
            INSERT INTO stock (tenant_id, product_id, warehouse_id, quantity, updated_at)
            VALUES ($1, $2, $3, 0, NOW())
            ON CONFLICT (tenant_id, product_id, warehouse_id) DO NOTHING
            "#,
        )
        .bind(self.tenant_id.as_uuid())
        .bind(key.product_id.as_uuid())
        .bind(key.warehouse_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("seed_stock", e))?
        .rows_affected()
            == 1;

        let row = sqlx::query(
            r#"
            SELECT product_id, warehouse_id, quantity, updated_at
            FROM stock
            WHERE tenant_id = $1 AND product_id = $2 AND warehouse_id = $3
            FOR UPDATE
            "#,
        )
        .bind(self.tenant_id.as_uuid())
        .bind(key.product_id.as_uuid())
        .bind(key.warehouse_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_stock", e))?;

        if seeded {
            return Ok(None);
        }
        stock_from_row(&row).map(Some)
    }

    async fn upsert(&mut self, stock: &Stock) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO stock (tenant_id, product_id, warehouse_id, quantity, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tenant_id, product_id, warehouse_id)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(self.tenant_id.as_uuid())
        .bind(stock.product_id.as_uuid())
        .bind(stock.warehouse_id.as_uuid())
        .bind(stock.quantity)
        .bind(stock.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_stock", e))?;
        Ok(())
    }

    async fn append(&mut self, movement: &StockMovement) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, tenant_id, product_id, warehouse_id, quantity, movement_type,
                reason, reference_id, operation_id, created_at, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(self.tenant_id.as_uuid())
        .bind(movement.product_id.as_uuid())
        .bind(movement.warehouse_id.as_uuid())
        .bind(movement.quantity)
        .bind(movement.movement_type.as_str())
        .bind(&movement.reason)
        .bind(movement.reference_id.as_ref().map(|r| r.as_str()))
        .bind(movement.operation_id)
        .bind(movement.created_at)
        .bind(movement.created_by.map(|u| *u.as_uuid()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_movement", e))?;
        Ok(())
    }

    async fn get_document_for_update(
        &mut self,
        kind: DocumentKind,
        id: Uuid,
    ) -> Result<Option<Document>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT body FROM ledger_documents
            WHERE tenant_id = $1 AND kind = $2 AND id = $3
            FOR UPDATE
            "#,
        )
        .bind(self.tenant_id.as_uuid())
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_document", e))?;

        row.map(|r| document_from_row(kind, id, &r)).transpose()
    }

    async fn put_document(&mut self, document: &Document) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_documents (tenant_id, kind, id, body, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (tenant_id, kind, id)
            DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()
            "#,
        )
        .bind(self.tenant_id.as_uuid())
        .bind(document.kind.as_str())
        .bind(document.id)
        .bind(&document.body)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("put_document", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

fn corrupt(e: sqlx::Error) -> StorageError {
    StorageError::Corrupt(format!("failed to decode row: {e}"))
}

fn stock_from_row(row: &PgRow) -> Result<Stock, StorageError> {
    let product_id: Uuid = row.try_get("product_id").map_err(corrupt)?;
    let warehouse_id: Uuid = row.try_get("warehouse_id").map_err(corrupt)?;
    let quantity: i64 = row.try_get("quantity").map_err(corrupt)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(corrupt)?;
    Ok(Stock {
        product_id: ProductId::from_uuid(product_id),
        warehouse_id: WarehouseId::from_uuid(warehouse_id),
        quantity,
        updated_at,
    })
}

fn movement_from_row(row: &PgRow) -> Result<StockMovement, StorageError> {
    let movement_type: String = row.try_get("movement_type").map_err(corrupt)?;
    let movement_type = MovementType::parse(&movement_type)
        .ok_or_else(|| StorageError::Corrupt(format!("unknown movement type '{movement_type}'")))?;
    let reference_id: Option<String> = row.try_get("reference_id").map_err(corrupt)?;
    let created_by: Option<Uuid> = row.try_get("created_by").map_err(corrupt)?;

    Ok(StockMovement {
        id: MovementId::from_uuid(row.try_get("id").map_err(corrupt)?),
        product_id: ProductId::from_uuid(row.try_get("product_id").map_err(corrupt)?),
        warehouse_id: WarehouseId::from_uuid(row.try_get("warehouse_id").map_err(corrupt)?),
        quantity: row.try_get("quantity").map_err(corrupt)?,
        movement_type,
        reason: row.try_get("reason").map_err(corrupt)?,
        reference_id: reference_id.map(ReferenceId::new),
        operation_id: row.try_get("operation_id").map_err(corrupt)?,
        created_at: row.try_get("created_at").map_err(corrupt)?,
        created_by: created_by.map(UserId::from_uuid),
    })
}

fn document_from_row(kind: DocumentKind, id: Uuid, row: &PgRow) -> Result<Document, StorageError> {
    Ok(Document {
        kind,
        id,
        body: row.try_get("body").map_err(corrupt)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("40001") | Some("40P01") => StorageError::Conflict(msg),
                _ => StorageError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            StorageError::Unavailable(format!("{operation}: {err}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StorageError::Corrupt(format!("{operation}: {err}"))
        }
        _ => StorageError::Database(format!("sqlx error in {operation}: {err}")),
    }
}
