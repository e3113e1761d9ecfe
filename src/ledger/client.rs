//! Protected ledger client
//!
//! `LedgerClient` wraps a `LedgerApi` with a circuit breaker and a per-call
//! timeout, and maps outcomes for the orchestrator:
//!
//! | transport outcome              | create_transfer             | get_transfer |
//! |--------------------------------|-----------------------------|--------------|
//! | 2xx                            | `Accepted(body)`            | `Some(..)`   |
//! | 404 / 412                      | `Err(AccountNotFound/...)`  | `None`       |
//! | timeout, 5xx, transport, open  | `Fallback`                  | `None`       |
//!
//! Domain rejections count as successes for breaker accounting: the ledger
//! answered, it just said no.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use super::LedgerApi;
use crate::types::{LedgerError, TransferError, TransferId, TransferRecord, TransferRequest};

/// Response recorded when a create call could not complete
pub const FALLBACK_RESPONSE: &str = "FAILURE";

/// Ledger connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Base URL of the ledger service, e.g. `http://ledger:8080`
    pub base_url: String,
    /// Path of the transfers resource
    pub transfer_path: String,
    /// Upper bound on a single ledger call
    pub call_timeout: Duration,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            transfer_path: "/transfers".to_string(),
            call_timeout: Duration::from_secs(5),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Result of a create call that did not end in a domain rejection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerResponse {
    /// The ledger accepted the transfer and answered with this body
    Accepted(String),
    /// The call failed or was short-circuited
    Fallback,
}

impl LedgerResponse {
    /// Body to record for idempotency purposes
    pub fn body(&self) -> &str {
        match self {
            LedgerResponse::Accepted(body) => body,
            LedgerResponse::Fallback => FALLBACK_RESPONSE,
        }
    }

    pub fn into_body(self) -> String {
        match self {
            LedgerResponse::Accepted(body) => body,
            LedgerResponse::Fallback => FALLBACK_RESPONSE.to_string(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, LedgerResponse::Fallback)
    }
}

/// Ledger client with circuit breaking, timeouts and fallbacks
pub struct LedgerClient {
    api: Arc<dyn LedgerApi>,
    breaker: CircuitBreaker,
    call_timeout: Duration,
}

impl LedgerClient {
    pub fn new(api: Arc<dyn LedgerApi>, config: &LedgerConfig) -> Self {
        Self {
            api,
            breaker: CircuitBreaker::new("ledger-transfer", config.circuit_breaker.clone()),
            call_timeout: config.call_timeout,
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Submit a transfer to the ledger
    ///
    /// # Errors
    ///
    /// Only the deterministic rejections: `TransferError::AccountNotFound` and
    /// `TransferError::InsufficientFunds`. Every other failure becomes
    /// `LedgerResponse::Fallback`.
    pub async fn create_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<LedgerResponse, TransferError> {
        let transfer_id = request.transfer_id.unwrap_or_default();

        match self.guarded(self.api.create_transfer(request)).await {
            Ok(body) => {
                debug!(transfer_id, "Ledger accepted transfer");
                Ok(LedgerResponse::Accepted(body))
            }
            Err(LedgerError::AccountNotFound(message)) => {
                Err(TransferError::account_not_found(transfer_id, &message))
            }
            Err(LedgerError::InsufficientFunds(message)) => {
                Err(TransferError::insufficient_funds(transfer_id, &message))
            }
            Err(e) => {
                warn!(transfer_id, error = %e, "Create transfer fallback");
                Ok(LedgerResponse::Fallback)
            }
        }
    }

    /// Read a transfer back from the ledger; `None` when unknown or unavailable
    pub async fn get_transfer(&self, transfer_id: TransferId) -> Option<TransferRecord> {
        match self.guarded(self.api.get_transfer(transfer_id)).await {
            Ok(record) => record,
            Err(e) => {
                warn!(transfer_id, error = %e, "Get transfer fallback");
                None
            }
        }
    }

    async fn guarded<T, F>(&self, call: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        // Held across the await so a cancelled call still settles the breaker
        let Some(permit) = self.breaker.try_acquire() else {
            return Err(LedgerError::CircuitOpen);
        };

        let result = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout {
                after_ms: self.call_timeout.as_millis() as u64,
            }),
        };

        match &result {
            Ok(_) => permit.record_success(),
            Err(e) if e.is_domain_rejection() => permit.record_success(),
            Err(_) => permit.record_failure(),
        }

        result
    }
}
