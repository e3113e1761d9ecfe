//! Core traits for idempotency storage and time
//!
//! These traits are the seams between the orchestrator and its collaborators,
//! so the in-memory implementations can be swapped for persistent ones and
//! tests can control time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{IdempotencyRecord, TransferError, TransferId};

/// Persistence contract for idempotency records
///
/// `find` and `save` are independent operations. Nothing makes the
/// lookup-then-write sequence atomic, so two concurrent submissions under the
/// same fresh key can both miss and both write.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Look up the record stored under `key`, expired or not
    ///
    /// Absence is `Ok(None)`; `Err` is reserved for storage faults.
    async fn find(&self, key: &str) -> Result<Option<IdempotencyRecord>, TransferError>;

    /// Look up a record through the transfer-id index
    async fn find_by_transfer_id(
        &self,
        transfer_id: TransferId,
    ) -> Result<Option<IdempotencyRecord>, TransferError>;

    /// Upsert `record` under its key and return what was persisted
    ///
    /// # Errors
    ///
    /// `TransferError::Storage` on persistence faults. The store does not retry.
    async fn save(&self, record: IdempotencyRecord) -> Result<IdempotencyRecord, TransferError>;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
