use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use stockledger_core::{ProductId, TenantId};
use stockledger_inventory::{Stock, StockKey, StockMovement};

use super::{
    Document, DocumentKind, DocumentStore, LedgerStorage, LedgerTx, MovementLog, StockStore,
    StorageError,
};

#[derive(Debug, Default)]
struct State {
    stock: BTreeMap<(TenantId, StockKey), Stock>,
    movements: HashMap<(TenantId, StockKey), Vec<StockMovement>>,
    documents: BTreeMap<(TenantId, DocumentKind, Uuid), Document>,
}

/// In-memory ledger backend.
///
/// Intended for tests/dev and single-process deployments. Read-modify-write ordering
/// comes from the ledger's keyed locks; this type only guarantees that a transaction's
/// writes land together.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStorage {
    state: Arc<RwLock<State>>,
}

impl InMemoryLedgerStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StorageError> {
        self.state
            .read()
            .map_err(|_| StorageError::Unavailable("lock poisoned".to_string()))
    }
}

#[async_trait]
impl StockStore for InMemoryLedgerStorage {
    async fn get(&self, tenant_id: TenantId, key: StockKey) -> Result<Option<Stock>, StorageError> {
        Ok(self.read()?.stock.get(&(tenant_id, key)).cloned())
    }

    async fn list_for_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Vec<Stock>, StorageError> {
        let state = self.read()?;
        Ok(state
            .stock
            .iter()
            .filter(|((t, k), _)| *t == tenant_id && k.product_id == product_id)
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn list_at_or_below(
        &self,
        tenant_id: TenantId,
        threshold: i64,
    ) -> Result<Vec<Stock>, StorageError> {
        let state = self.read()?;
        Ok(state
            .stock
            .iter()
            .filter(|((t, _), s)| *t == tenant_id && s.quantity <= threshold)
            .map(|(_, s)| s.clone())
            .collect())
    }
}

#[async_trait]
impl MovementLog for InMemoryLedgerStorage {
    async fn list_for(
        &self,
        tenant_id: TenantId,
        key: StockKey,
    ) -> Result<Vec<StockMovement>, StorageError> {
        let mut out = self
            .read()?
            .movements
            .get(&(tenant_id, key))
            .cloned()
            .unwrap_or_default();
        // Stable sort keeps append order for equal timestamps.
        out.sort_by_key(|m| m.created_at);
        Ok(out)
    }
}

#[async_trait]
impl DocumentStore for InMemoryLedgerStorage {
    async fn get_document(
        &self,
        tenant_id: TenantId,
        kind: DocumentKind,
        id: Uuid,
    ) -> Result<Option<Document>, StorageError> {
        Ok(self.read()?.documents.get(&(tenant_id, kind, id)).cloned())
    }

    async fn list_documents(
        &self,
        tenant_id: TenantId,
        kind: DocumentKind,
    ) -> Result<Vec<Document>, StorageError> {
        let state = self.read()?;
        Ok(state
            .documents
            .iter()
            .filter(|((t, k, _), _)| *t == tenant_id && *k == kind)
            .map(|(_, d)| d.clone())
            .collect())
    }
}

#[async_trait]
impl LedgerStorage for InMemoryLedgerStorage {
    async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn LedgerTx>, StorageError> {
        Ok(Box::new(InMemoryTx {
            state: self.state.clone(),
            tenant_id,
            stock: BTreeMap::new(),
            movements: Vec::new(),
            documents: Vec::new(),
        }))
    }
}

/// Staged writes; nothing touches shared state before `commit`.
struct InMemoryTx {
    state: Arc<RwLock<State>>,
    tenant_id: TenantId,
    stock: BTreeMap<StockKey, Stock>,
    movements: Vec<StockMovement>,
    documents: Vec<Document>,
}

impl InMemoryTx {
    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StorageError> {
        self.state
            .read()
            .map_err(|_| StorageError::Unavailable("lock poisoned".to_string()))
    }
}

#[async_trait]
impl LedgerTx for InMemoryTx {
    async fn get_for_update(&mut self, key: StockKey) -> Result<Option<Stock>, StorageError> {
        if let Some(staged) = self.stock.get(&key) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.read()?.stock.get(&(self.tenant_id, key)).cloned())
    }

    async fn upsert(&mut self, stock: &Stock) -> Result<(), StorageError> {
        self.stock.insert(stock.key(), stock.clone());
        Ok(())
    }

    async fn append(&mut self, movement: &StockMovement) -> Result<(), StorageError> {
        self.movements.push(movement.clone());
        Ok(())
    }

    async fn get_document_for_update(
        &mut self,
        kind: DocumentKind,
        id: Uuid,
    ) -> Result<Option<Document>, StorageError> {
        if let Some(staged) = self.documents.iter().rev().find(|d| d.kind == kind && d.id == id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.read()?.documents.get(&(self.tenant_id, kind, id)).cloned())
    }

    async fn put_document(&mut self, document: &Document) -> Result<(), StorageError> {
        self.documents.push(document.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let this = *self;
        let mut state = this
            .state
            .write()
            .map_err(|_| StorageError::Unavailable("lock poisoned".to_string()))?;

        if let Some(dup) = this.movements.iter().find(|m| {
            state
                .movements
                .get(&(this.tenant_id, m.key()))
                .is_some_and(|log| log.iter().any(|existing| existing.id == m.id))
        }) {
            return Err(StorageError::Conflict(format!("movement {} already recorded", dup.id)));
        }

        for (key, row) in this.stock {
            state.stock.insert((this.tenant_id, key), row);
        }
        for m in this.movements {
            state.movements.entry((this.tenant_id, m.key())).or_default().push(m);
        }
        for d in this.documents {
            state.documents.insert((this.tenant_id, d.kind, d.id), d);
        }
        Ok(())
    }
}
