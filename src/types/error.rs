//! Error types for the transfer orchestrator
//!
//! This module defines the errors surfaced to callers of the orchestrator and
//! the lower-level errors produced by the ledger transport.
//!
//! # Error Categories
//!
//! - **Domain rejections**: account not found, insufficient funds. Deterministic,
//!   never retried, never cached.
//! - **Storage errors**: idempotency persistence faults. Fatal to the request.
//! - **Batch errors**: invalid batch size, items without a transfer id, failed tasks.
//! - **Input errors**: I/O, CSV parsing and configuration problems in the CLI.
//!
//! Transient ledger failures never show up here: the ledger client turns them
//! into a fallback response instead.

use thiserror::Error;

use super::transfer::TransferId;

/// Main error type for the orchestrator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransferError {
    /// The ledger reported that one of the accounts does not exist
    #[error("Account not found for transfer {transfer_id}: {message}")]
    AccountNotFound {
        transfer_id: TransferId,
        /// Body returned by the ledger
        message: String,
    },

    /// The ledger rejected the transfer for lack of funds
    #[error("Insufficient funds for transfer {transfer_id}: {message}")]
    InsufficientFunds {
        transfer_id: TransferId,
        /// Body returned by the ledger
        message: String,
    },

    /// The idempotency store failed to read or write
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// A keyed submission arrived without an idempotency key
    #[error("Transfer has no idempotency key")]
    MissingIdempotencyKey,

    /// A batch item arrived without the transfer id batch mode requires
    #[error("Batch item {index} has no transfer id")]
    MissingTransferId { index: usize },

    /// Batch size outside the accepted range
    #[error("Batch size {size} outside accepted range 1..={max}")]
    InvalidBatchSize { size: usize, max: usize },

    /// A spawned batch task panicked or was aborted
    #[error("Batch task failed: {message}")]
    TaskFailed { message: String },

    /// Invalid runtime configuration (bad URL, HTTP client construction)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    IoError { message: String },

    /// CSV parsing error occurred
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        line: Option<u64>,
        message: String,
    },
}

impl From<std::io::Error> for TransferError {
    fn from(error: std::io::Error) -> Self {
        TransferError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for TransferError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        TransferError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl From<csv_async::Error> for TransferError {
    fn from(error: csv_async::Error) -> Self {
        // csv-async folds the position into its message
        TransferError::ParseError {
            line: None,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl TransferError {
    pub fn account_not_found(transfer_id: TransferId, message: &str) -> Self {
        TransferError::AccountNotFound {
            transfer_id,
            message: message.to_string(),
        }
    }

    pub fn insufficient_funds(transfer_id: TransferId, message: &str) -> Self {
        TransferError::InsufficientFunds {
            transfer_id,
            message: message.to_string(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        TransferError::Storage {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        TransferError::Configuration {
            message: message.into(),
        }
    }

    /// Whether this is a deterministic rejection from the ledger
    pub fn is_domain_rejection(&self) -> bool {
        matches!(
            self,
            TransferError::AccountNotFound { .. } | TransferError::InsufficientFunds { .. }
        )
    }
}

/// Errors produced by the ledger transport
///
/// These never reach orchestrator callers directly. The ledger client maps the
/// two business rejections onto `TransferError` and everything else onto the
/// fallback response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// HTTP 404 on create
    #[error("Ledger reported account not found: {0}")]
    AccountNotFound(String),

    /// HTTP 412 on create
    #[error("Ledger reported insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Any other non-2xx status
    #[error("Ledger returned unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Connection refused, reset, DNS failure and the like
    #[error("Ledger transport error: {0}")]
    Transport(String),

    /// The call did not finish within the configured timeout
    #[error("Ledger call timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// The circuit breaker rejected the call without attempting it
    #[error("Ledger circuit is open")]
    CircuitOpen,

    /// The response body could not be decoded
    #[error("Failed to decode ledger response: {0}")]
    Decode(String),
}

impl LedgerError {
    /// Whether the ledger answered with a deterministic business rejection
    pub fn is_domain_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::AccountNotFound(_) | LedgerError::InsufficientFunds(_)
        )
    }
}
