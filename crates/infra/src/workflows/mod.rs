//! Collaborator flows that call into the Ledger Service.
//!
//! Each flow persists its own record as a document in the same storage transaction as
//! the movements it causes, so a rejected ledger unit leaves no record behind either.

pub mod invoice;
pub mod product;
pub mod receiving;

pub use invoice::InvoiceWorkflow;
pub use product::{ProductOnboarding, ProductRecord};
pub use receiving::ReceivingWorkflow;
