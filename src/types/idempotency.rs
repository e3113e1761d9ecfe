//! Idempotency records and batch outcomes
//!
//! An `IdempotencyRecord` is what the orchestrator hands back to callers: the
//! transfer identifier produced for a key plus the downstream response, valid
//! until `expiry`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::TransferError;
use super::transfer::TransferId;

/// Outcome of a transfer, remembered under its idempotency key
///
/// Records are written once and never updated. A record stops being
/// replayable when `expiry` is reached, after which the key may be reused
/// for a fresh transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Caller-supplied idempotency token (primary key)
    pub key: String,

    /// Transfer identifier allocated for this key
    pub transfer_id: TransferId,

    /// Body returned by the ledger, or the fallback sentinel
    pub response: String,

    /// Instant after which the record is stale
    pub expiry: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn new(
        key: impl Into<String>,
        transfer_id: TransferId,
        response: impl Into<String>,
        expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            transfer_id,
            response: response.into(),
            expiry,
        }
    }

    /// Whether the record may still be replayed at `now`
    ///
    /// Live strictly before `expiry`; at `expiry` the record is already stale.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expiry
    }
}

/// Outcome of one item of a batch submission
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItemResult {
    /// Transfer identifier the item carried (0 when it carried none)
    pub transfer_id: TransferId,

    /// Confirmation string on success, the item's own error otherwise
    pub outcome: Result<String, TransferError>,
}

impl BatchItemResult {
    /// Build the confirmation string reported for a processed item
    pub fn confirmation(transfer_id: TransferId, response: &str) -> String {
        format!("Processed: {}, {}", transfer_id, response)
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Outcome of one keyed submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    /// Idempotency key the submission used (empty when the input had none)
    pub key: String,
    pub result: Result<IdempotencyRecord, TransferError>,
}
