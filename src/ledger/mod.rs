//! Downstream ledger access
//!
//! - `LedgerApi` - raw transport to the ledger service
//! - `http` - reqwest-backed transport
//! - `stub` - in-process ledger for tests and benchmarks
//! - `circuit_breaker` - call-guarding state machine
//! - `client` - `LedgerClient`, the breaker/timeout/fallback wrapper the
//!   orchestrator talks to

pub mod circuit_breaker;
pub mod client;
pub mod http;
pub mod stub;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use client::{LedgerClient, LedgerConfig, LedgerResponse, FALLBACK_RESPONSE};
pub use http::HttpLedgerApi;
pub use stub::{StubBehavior, StubLedger};

use async_trait::async_trait;

use crate::types::{LedgerError, TransferId, TransferRecord, TransferRequest};

/// Raw transport to the ledger service
///
/// Implementations report every failure as a `LedgerError`; turning failures
/// into fallbacks is `LedgerClient`'s job.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Submit a transfer; returns the ledger's response body on success
    async fn create_transfer(&self, request: &TransferRequest) -> Result<String, LedgerError>;

    /// Fetch a transfer; `Ok(None)` when the ledger does not know it
    async fn get_transfer(
        &self,
        transfer_id: TransferId,
    ) -> Result<Option<TransferRecord>, LedgerError>;
}
