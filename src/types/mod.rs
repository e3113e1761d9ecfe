//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `transfer`: Transfer requests, ledger records and identifiers
//! - `idempotency`: Idempotency records and batch outcomes
//! - `error`: Error types for the orchestrator and the ledger transport

pub mod error;
pub mod idempotency;
pub mod transfer;

pub use error::{LedgerError, TransferError};
pub use idempotency::{BatchItemResult, IdempotencyRecord, SubmissionOutcome};
pub use transfer::{AccountId, TransferId, TransferRecord, TransferRequest};
