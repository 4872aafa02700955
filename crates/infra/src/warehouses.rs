use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use stockledger_core::{TenantId, WarehouseId};
use stockledger_inventory::{NewWarehouse, Warehouse};

use crate::ledger::{LedgerResult, require};
use crate::locks::KeyedLocks;
use crate::storage::{Document, DocumentKind, LedgerStorage, StorageError};

/// Tenant-scoped registry of warehouses, fed by the warehouse-management flow and
/// persisted as documents next to the ledger.
///
/// Listing order is registration order (ids are time-ordered), which makes "first
/// primary active warehouse" deterministic. Registering a new primary warehouse clears
/// the flag on the previous one in the same transaction.
#[derive(Clone)]
pub struct WarehouseDirectory {
    storage: Arc<dyn LedgerStorage>,
    locks: Arc<KeyedLocks<TenantId>>,
}

impl WarehouseDirectory {
    pub fn new(storage: Arc<dyn LedgerStorage>, lock_timeout: Duration) -> Self {
        Self {
            storage,
            locks: Arc::new(KeyedLocks::new(lock_timeout)),
        }
    }

    pub async fn register(&self, tenant_id: TenantId, new: NewWarehouse) -> LedgerResult<Warehouse> {
        let warehouse = Warehouse::register(WarehouseId::new(), new)?;

        // One directory writer per tenant.
        let _guard = self.locks.lock(tenant_id).await?;

        let mut demoted = Vec::new();
        if warehouse.is_primary {
            for mut previous in self.list(tenant_id).await? {
                if previous.is_primary {
                    previous.is_primary = false;
                    demoted.push(previous);
                }
            }
        }

        let mut tx = self.storage.begin(tenant_id).await?;
        for w in demoted.iter().chain(std::iter::once(&warehouse)) {
            tx.put_document(&encode(w)?).await?;
        }
        tx.commit().await?;

        info!(
            tenant_id = %tenant_id,
            warehouse_id = %warehouse.id,
            is_primary = warehouse.is_primary,
            "warehouse registered"
        );
        Ok(warehouse)
    }

    pub async fn get(&self, tenant_id: TenantId, id: WarehouseId) -> LedgerResult<Option<Warehouse>> {
        let document = self
            .storage
            .get_document(tenant_id, DocumentKind::Warehouse, *id.as_uuid())
            .await?;
        Ok(document.map(|d| d.decode()).transpose()?)
    }

    pub async fn list(&self, tenant_id: TenantId) -> LedgerResult<Vec<Warehouse>> {
        let documents = self
            .storage
            .list_documents(tenant_id, DocumentKind::Warehouse)
            .await?;
        let mut warehouses = documents
            .iter()
            .map(Document::decode)
            .collect::<Result<Vec<Warehouse>, _>>()?;
        warehouses.sort_by_key(|w| w.id);
        Ok(warehouses)
    }

    /// Take a warehouse out of service. It stays listed but is skipped for onboarding
    /// and refuses receipts. Deactivating twice is a no-op.
    pub async fn deactivate(&self, tenant_id: TenantId, id: WarehouseId) -> LedgerResult<Warehouse> {
        let _guard = self.locks.lock(tenant_id).await?;

        let mut warehouse = require(self.get(tenant_id, id).await?, || format!("warehouse {id}"))?;
        if warehouse.is_active {
            warehouse.is_active = false;
            let mut tx = self.storage.begin(tenant_id).await?;
            tx.put_document(&encode(&warehouse)?).await?;
            tx.commit().await?;
            info!(tenant_id = %tenant_id, warehouse_id = %id, "warehouse deactivated");
        }
        Ok(warehouse)
    }
}

fn encode(warehouse: &Warehouse) -> Result<Document, StorageError> {
    Document::encode(DocumentKind::Warehouse, *warehouse.id.as_uuid(), warehouse)
}

#[cfg(test)]
mod tests {
    use stockledger_core::DomainError;
    use stockledger_inventory::primary_warehouse;

    use super::*;
    use crate::ledger::LedgerError;
    use crate::storage::InMemoryLedgerStorage;

    fn directory() -> (Arc<dyn LedgerStorage>, WarehouseDirectory) {
        let storage: Arc<dyn LedgerStorage> = Arc::new(InMemoryLedgerStorage::new());
        let dir = WarehouseDirectory::new(storage.clone(), Duration::from_secs(5));
        (storage, dir)
    }

    fn new(name: &str, is_primary: bool) -> NewWarehouse {
        NewWarehouse {
            name: name.to_string(),
            location: None,
            is_primary,
        }
    }

    #[tokio::test]
    async fn newest_primary_wins() {
        let (_storage, dir) = directory();
        let t = TenantId::new();
        let first = dir.register(t, new("Main", true)).await.unwrap();
        let second = dir.register(t, new("New Main", true)).await.unwrap();

        assert!(!dir.get(t, first.id).await.unwrap().unwrap().is_primary);
        let all = dir.list(t).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(primary_warehouse(&all).map(|w| w.id), Some(second.id));
    }

    #[tokio::test]
    async fn listing_is_tenant_scoped() {
        let (_storage, dir) = directory();
        let (a, b) = (TenantId::new(), TenantId::new());
        dir.register(a, new("A", true)).await.unwrap();
        dir.register(b, new("B", true)).await.unwrap();

        let names: Vec<String> = dir.list(a).await.unwrap().into_iter().map(|w| w.name).collect();
        assert_eq!(names, vec!["A".to_string()]);
        // Another tenant's primary is untouched.
        assert!(dir.list(b).await.unwrap()[0].is_primary);
    }

    #[tokio::test]
    async fn registrations_survive_a_new_directory() {
        let (storage, dir) = directory();
        let t = TenantId::new();
        let main = dir.register(t, new("Main", true)).await.unwrap();

        let reopened = WarehouseDirectory::new(storage, Duration::from_secs(5));
        assert_eq!(reopened.get(t, main.id).await.unwrap(), Some(main.clone()));
        assert_eq!(reopened.list(t).await.unwrap(), vec![main]);
    }

    #[tokio::test]
    async fn deactivated_primary_is_no_longer_chosen() {
        let (_storage, dir) = directory();
        let t = TenantId::new();
        let main = dir.register(t, new("Main", true)).await.unwrap();

        let closed = dir.deactivate(t, main.id).await.unwrap();
        assert!(!closed.is_active);
        assert!(!dir.get(t, main.id).await.unwrap().unwrap().is_active);
        assert!(primary_warehouse(&dir.list(t).await.unwrap()).is_none());

        // Again: no-op.
        assert!(!dir.deactivate(t, main.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn deactivating_unknown_warehouse_is_not_found() {
        let (_storage, dir) = directory();
        let err = dir.deactivate(TenantId::new(), WarehouseId::new()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Domain(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn invalid_registration_stores_nothing() {
        let (_storage, dir) = directory();
        let t = TenantId::new();
        let err = dir.register(t, new("  ", false)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Domain(DomainError::InvalidRequest(_))));
        assert!(dir.list(t).await.unwrap().is_empty());
    }
}
