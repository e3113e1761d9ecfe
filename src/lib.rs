//! Idempotent Transfer Orchestrator
//! # Overview
//!
//! This library accepts money-transfer requests, assigns each a unique transfer
//! id, forwards it to a downstream ledger service and guarantees that a client
//! retrying with the same idempotency key within the replay window gets the
//! original outcome back instead of moving money twice.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (TransferRequest, IdempotencyRecord, errors)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::orchestrator`] - Keyed submission, status lookup and batch fan-out
//!   - [`core::idempotency_store`] - Records keyed by idempotency key and transfer id
//!   - [`core::allocator`] - Process-wide transfer id sequence
//!   - [`core::clock`] - Wall clock and a settable clock for tests
//! - [`ledger`] - Downstream access guarded by a circuit breaker and timeout
//! - [`io`] - CSV input reading and report writing
//! - [`strategy`] - Single and batch submission pipelines
//! - [`logging`] - tracing subscriber setup
//!
//! # Outcomes
//!
//! A submission ends in one of:
//!
//! - **Accepted**: the ledger's response body is recorded and replayed
//! - **Fallback**: the ledger was unreachable, slow or the circuit was open;
//!   the `FAILURE` sentinel is recorded and replayed
//! - **Rejected**: account not found or insufficient funds; surfaced to the
//!   caller and never recorded, so a retry reaches the ledger again

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod ledger;
pub mod logging;
pub mod strategy;
pub mod types;

pub use core::{
    Clock, IdempotencyStore, InMemoryIdempotencyStore, OrchestratorConfig, TransferIdAllocator,
    TransferOrchestrator,
};
pub use ledger::{HttpLedgerApi, LedgerApi, LedgerClient, LedgerConfig, FALLBACK_RESPONSE};
pub use types::{
    BatchItemResult, IdempotencyRecord, LedgerError, TransferError, TransferId, TransferRecord,
    TransferRequest,
};
