//! Infrastructure layer: ledger service, storage backends, locking, config.

pub mod config;
pub mod ledger;
pub mod locks;
pub mod storage;
pub mod warehouses;
pub mod workflows;

#[cfg(test)]
mod integration_tests;

pub use config::{ConfigError, LedgerConfig, StorageBackend};
pub use ledger::{LedgerContext, LedgerError, LedgerResult, LedgerService, ReplayReport};
pub use locks::{KeyedGuard, KeyedLocks, LockTimeout};
pub use storage::{InMemoryLedgerStorage, LedgerStorage, PostgresLedgerStorage, StorageError};
pub use warehouses::WarehouseDirectory;
pub use workflows::{InvoiceWorkflow, ProductOnboarding, ProductRecord, ReceivingWorkflow};
