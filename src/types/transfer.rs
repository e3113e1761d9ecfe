//! Transfer-related types for the transfer orchestrator
//!
//! This module defines the transfer request submitted by callers, the record
//! returned by the downstream ledger, and the identifiers used throughout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account identifier in the downstream ledger
pub type AccountId = u64;

/// Transfer identifier
///
/// Assigned by the orchestrator for single submissions, pre-set by the caller
/// for batch submissions.
pub type TransferId = u64;

/// A money-transfer request
///
/// Serializes to the ledger's wire body: `{transferId, fromAccountId, toAccountId, amount}`.
/// The amount is kept as a `Decimal` end to end and goes over the wire as a
/// decimal string, never as a float.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    /// Identifier of this transfer, `None` until one is allocated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<TransferId>,

    /// Account debited by the transfer
    pub from_account_id: AccountId,

    /// Account credited by the transfer
    pub to_account_id: AccountId,

    /// Signed amount moved between the accounts
    pub amount: Decimal,
}

impl TransferRequest {
    /// Create a request with no transfer identifier yet
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: Decimal) -> Self {
        Self {
            transfer_id: None,
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// Consume the request and return it stamped with `transfer_id`
    ///
    /// Any identifier the caller put on the request is replaced.
    pub fn with_transfer_id(self, transfer_id: TransferId) -> Self {
        Self {
            transfer_id: Some(transfer_id),
            ..self
        }
    }
}

/// Transfer as reported back by the downstream ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub transfer_id: TransferId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
}

impl From<&TransferRequest> for TransferRecord {
    fn from(request: &TransferRequest) -> Self {
        Self {
            transfer_id: request.transfer_id.unwrap_or_default(),
            from_account_id: request.from_account_id,
            to_account_id: request.to_account_id,
            amount: request.amount,
        }
    }
}
