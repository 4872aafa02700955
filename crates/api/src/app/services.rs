use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use stockledger_infra::{
    InMemoryLedgerStorage, InvoiceWorkflow, KeyedLocks, LedgerConfig, LedgerService,
    LedgerStorage, PostgresLedgerStorage, ProductOnboarding, ReceivingWorkflow, StorageBackend,
    WarehouseDirectory,
};

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppServices {
    pub ledger: LedgerService,
    pub warehouses: Arc<WarehouseDirectory>,
    pub invoices: InvoiceWorkflow,
    pub receiving: ReceivingWorkflow,
    pub products: ProductOnboarding,
}

impl AppServices {
    pub fn new(storage: Arc<dyn LedgerStorage>, lock_timeout: Duration) -> Self {
        let ledger = LedgerService::new(storage.clone(), lock_timeout);
        let warehouses = Arc::new(WarehouseDirectory::new(storage, lock_timeout));

        Self {
            invoices: InvoiceWorkflow::new(ledger.clone()),
            receiving: ReceivingWorkflow::new(
                ledger.clone(),
                warehouses.clone(),
                KeyedLocks::new(lock_timeout),
            ),
            products: ProductOnboarding::new(ledger.clone(), warehouses.clone()),
            warehouses,
            ledger,
        }
    }

    pub fn in_memory(lock_timeout: Duration) -> Self {
        Self::new(Arc::new(InMemoryLedgerStorage::new()), lock_timeout)
    }

    /// Select and prepare the configured storage backend.
    pub async fn from_config(config: &LedgerConfig) -> anyhow::Result<Self> {
        let storage: Arc<dyn LedgerStorage> = match &config.storage {
            StorageBackend::Memory => {
                tracing::info!("using in-memory ledger storage");
                Arc::new(InMemoryLedgerStorage::new())
            }
            StorageBackend::Postgres { url, max_connections } => {
                let pg = PostgresLedgerStorage::connect(url, *max_connections)
                    .await
                    .context("failed to connect to postgres")?;
                pg.ensure_schema().await.context("failed to prepare ledger schema")?;
                tracing::info!(max_connections, "using postgres ledger storage");
                Arc::new(pg)
            }
        };

        Ok(Self::new(storage, config.lock_timeout))
    }
}
