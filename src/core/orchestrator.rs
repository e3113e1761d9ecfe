//! Idempotent transfer submission
//!
//! This module provides the `TransferOrchestrator` struct, which decides
//! whether a request has already been processed, allocates transfer
//! identifiers, dispatches new transfers to the ledger and records outcomes
//! for later deduplication.
//!
//! # Architecture
//!
//! ```text
//! TransferOrchestrator
//!     ├── Arc<dyn IdempotencyStore>  (records by key / by transfer id)
//!     ├── Arc<LedgerClient>          (breaker + timeout + fallback)
//!     ├── Arc<TransferIdAllocator>   (atomic counter)
//!     └── Arc<dyn Clock>             (expiry decisions)
//! ```
//!
//! # Outcomes
//!
//! | ledger outcome        | returned to caller    | idempotency record |
//! |-----------------------|-----------------------|--------------------|
//! | accepted              | record with body      | written            |
//! | fallback (transient)  | record with `FAILURE` | written            |
//! | domain rejection      | error                 | not written        |
//!
//! Recording fallbacks keeps retries under the same key from hammering a
//! failing ledger and from duplicating a transfer the ledger may have applied
//! before the client gave up on it.
//!
//! # Concurrency
//!
//! The orchestrator is cheap to clone; clones share all state. Lookup and
//! write are separate store calls, so two concurrent submissions under the
//! same fresh key can both reach the ledger.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use super::allocator::TransferIdAllocator;
use super::clock::SystemClock;
use super::idempotency_store::InMemoryIdempotencyStore;
use super::traits::{Clock, IdempotencyStore};
use crate::ledger::{LedgerApi, LedgerClient, LedgerConfig};
use crate::types::{BatchItemResult, IdempotencyRecord, TransferError, TransferId, TransferRequest};

/// Largest batch `submit_batch` accepts
pub const MAX_BATCH_SIZE: usize = 20;

/// Prefix of the idempotency keys batch items are recorded under
pub const BATCH_KEY_PREFIX: &str = "batch:";

/// Idempotency key for a batch item
///
/// Batch records live in their own key space, so a client token that happens
/// to spell a transfer id never replays a batch outcome, and a keyed record
/// never answers for a batch item.
pub fn batch_key(transfer_id: TransferId) -> String {
    format!("{}{}", BATCH_KEY_PREFIX, transfer_id)
}

/// How long an idempotency record stays replayable
pub const DEFAULT_IDEMPOTENCY_TTL_SECS: i64 = 2 * 60 * 60;

/// Orchestrator tuning
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub idempotency_ttl: Duration,
    pub max_batch_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            idempotency_ttl: Duration::seconds(DEFAULT_IDEMPOTENCY_TTL_SECS),
            max_batch_size: MAX_BATCH_SIZE,
        }
    }
}

impl OrchestratorConfig {
    /// Build a config, replacing out-of-range values with defaults
    pub fn new(idempotency_ttl: Duration, max_batch_size: usize) -> Self {
        let default = Self::default();

        let idempotency_ttl = if idempotency_ttl <= Duration::zero() {
            warn!(
                "Invalid idempotency_ttl ({}s), using default ({}s)",
                idempotency_ttl.num_seconds(),
                default.idempotency_ttl.num_seconds()
            );
            default.idempotency_ttl
        } else {
            idempotency_ttl
        };

        let max_batch_size = if max_batch_size == 0 || max_batch_size > MAX_BATCH_SIZE {
            warn!(
                "Invalid max_batch_size ({}), using default ({})",
                max_batch_size, default.max_batch_size
            );
            default.max_batch_size
        } else {
            max_batch_size
        };

        Self {
            idempotency_ttl,
            max_batch_size,
        }
    }
}

/// Idempotent transfer orchestrator
#[derive(Clone)]
pub struct TransferOrchestrator {
    store: Arc<dyn IdempotencyStore>,
    ledger: Arc<LedgerClient>,
    allocator: Arc<TransferIdAllocator>,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
}

impl TransferOrchestrator {
    pub fn new(
        store: Arc<dyn IdempotencyStore>,
        ledger: Arc<LedgerClient>,
        allocator: Arc<TransferIdAllocator>,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            allocator,
            clock,
            config,
        }
    }

    /// Orchestrator over an in-memory store, the wall clock and a fresh allocator
    pub fn in_memory(
        api: Arc<dyn LedgerApi>,
        ledger_config: &LedgerConfig,
        id_base: TransferId,
        config: OrchestratorConfig,
    ) -> Self {
        Self::new(
            Arc::new(InMemoryIdempotencyStore::new()),
            Arc::new(LedgerClient::new(api, ledger_config)),
            Arc::new(TransferIdAllocator::with_base(id_base)),
            Arc::new(SystemClock),
            config,
        )
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn ledger(&self) -> &LedgerClient {
        &self.ledger
    }

    /// Submit a transfer under a client-supplied idempotency key
    ///
    /// A live record under `key` is returned unchanged, without allocating an
    /// identifier or calling the ledger; the payload of a replay is ignored.
    /// Otherwise a new identifier is allocated, the ledger is called and the
    /// outcome recorded under `key` for the configured TTL.
    ///
    /// # Errors
    ///
    /// * `TransferError::AccountNotFound` / `InsufficientFunds` - ledger rejected
    ///   the transfer; nothing is recorded, so a retry under `key` tries again
    /// * `TransferError::Storage` - the idempotency store failed
    pub async fn submit(
        &self,
        request: TransferRequest,
        key: &str,
    ) -> Result<IdempotencyRecord, TransferError> {
        if let Some(existing) = self.store.find(key).await? {
            if existing.is_live(self.clock.now()) {
                info!(
                    key,
                    transfer_id = existing.transfer_id,
                    "Idempotent replay, returning stored outcome"
                );
                return Ok(existing);
            }
            debug!(key, transfer_id = existing.transfer_id, "Stored outcome expired");
        }

        let transfer_id = self.allocator.next();
        let request = request.with_transfer_id(transfer_id);
        debug!(key, transfer_id, "Allocated transfer id");

        let response = self.ledger.create_transfer(&request).await?;
        let record = self.record(key, transfer_id, response.into_body());
        let saved = self.store.save(record).await?;

        info!(
            key,
            transfer_id,
            response = %saved.response,
            "Transfer submitted"
        );
        Ok(saved)
    }

    /// Look up the stored outcome for `transfer_id`
    ///
    /// Reads only the idempotency store; the ledger is not consulted.
    pub async fn get_status(
        &self,
        transfer_id: TransferId,
    ) -> Result<Option<IdempotencyRecord>, TransferError> {
        self.store.find_by_transfer_id(transfer_id).await
    }

    /// Submit a batch of transfers concurrently
    ///
    /// Every item must carry its own transfer id, which doubles as its
    /// idempotency discriminator. Items run on independent tasks; one item's
    /// failure does not affect the others. The call returns once every item has
    /// finished, with results in submission order.
    ///
    /// # Errors
    ///
    /// `TransferError::InvalidBatchSize` when the batch is empty or larger than
    /// the configured maximum. Per-item failures are reported in the results.
    pub async fn submit_batch(
        &self,
        requests: Vec<TransferRequest>,
    ) -> Result<Vec<BatchItemResult>, TransferError> {
        if requests.is_empty() || requests.len() > self.config.max_batch_size {
            return Err(TransferError::InvalidBatchSize {
                size: requests.len(),
                max: self.config.max_batch_size,
            });
        }

        // Spawn one task per item
        let mut tasks = Vec::with_capacity(requests.len());
        for (index, request) in requests.into_iter().enumerate() {
            let transfer_id = request.transfer_id.unwrap_or_default();
            let orchestrator = self.clone();
            let task = tokio::spawn(async move {
                orchestrator.process_batch_item(index, request).await
            });
            tasks.push((transfer_id, task));
        }

        // Join in submission order
        let mut results = Vec::with_capacity(tasks.len());
        for (transfer_id, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(transfer_id, error = %e, "Batch task failed");
                    Err(TransferError::TaskFailed {
                        message: e.to_string(),
                    })
                }
            };
            results.push(BatchItemResult {
                transfer_id,
                outcome,
            });
        }

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        info!(
            items = results.len(),
            succeeded,
            failed = results.len() - succeeded,
            "Batch transfer completed"
        );
        Ok(results)
    }

    async fn process_batch_item(
        &self,
        index: usize,
        request: TransferRequest,
    ) -> Result<String, TransferError> {
        let transfer_id = request
            .transfer_id
            .ok_or(TransferError::MissingTransferId { index })?;

        let key = batch_key(transfer_id);
        if let Some(existing) = self.store.find(&key).await? {
            if existing.is_live(self.clock.now()) {
                info!(
                    transfer_id,
                    response = %existing.response,
                    "Idempotent replay of batch item"
                );
                return Ok(BatchItemResult::confirmation(
                    transfer_id,
                    &existing.response,
                ));
            }
        }

        let response = self.ledger.create_transfer(&request).await?;
        let record = self.record(&key, transfer_id, response.into_body());
        let saved = self.store.save(record).await?;

        info!(transfer_id, response = %saved.response, "Batch item submitted");
        Ok(BatchItemResult::confirmation(transfer_id, &saved.response))
    }

    fn record(&self, key: &str, transfer_id: TransferId, response: String) -> IdempotencyRecord {
        let expiry = self.clock.now() + self.config.idempotency_ttl;
        IdempotencyRecord::new(key, transfer_id, response, expiry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::idempotency_store::InMemoryIdempotencyStore;
    use crate::ledger::{LedgerConfig, StubBehavior, StubLedger, FALLBACK_RESPONSE};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    struct Harness {
        orchestrator: TransferOrchestrator,
        ledger: Arc<StubLedger>,
        store: Arc<InMemoryIdempotencyStore>,
        clock: Arc<ManualClock>,
    }

    fn harness_with(ledger: StubLedger) -> Harness {
        let ledger = Arc::new(ledger);
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap(),
        ));
        let client = LedgerClient::new(ledger.clone(), &LedgerConfig::default());
        let orchestrator = TransferOrchestrator::new(
            store.clone(),
            Arc::new(client),
            Arc::new(TransferIdAllocator::new()),
            clock.clone(),
            OrchestratorConfig::default(),
        );
        Harness {
            orchestrator,
            ledger,
            store,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(StubLedger::new())
    }

    fn transfer(from: u64, to: u64, amount: &str) -> TransferRequest {
        TransferRequest::new(from, to, Decimal::from_str(amount).unwrap())
    }

    fn batch_item(from: u64, transfer_id: TransferId) -> TransferRequest {
        transfer(from, 56789, "10.00").with_transfer_id(transfer_id)
    }

    #[tokio::test]
    async fn test_submit_then_replay_returns_identical_record() {
        let h = harness();

        let first = h
            .orchestrator
            .submit(transfer(12345, 56789, "200.00"), "key-A")
            .await
            .unwrap();
        assert_eq!(first.response, "SUCCESS");
        assert!(first.transfer_id >= 1_000_001);
        assert_eq!(first.key, "key-A");
        assert_eq!(first.expiry, h.clock.now() + Duration::hours(2));

        // Any payload under the same key replays the stored outcome
        let second = h
            .orchestrator
            .submit(transfer(1, 2, "999.99"), "key-A")
            .await
            .unwrap();

        assert_eq!(second, first);
        assert_eq!(h.ledger.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_record_is_not_replayed() {
        let h = harness();

        let first = h
            .orchestrator
            .submit(transfer(12345, 56789, "200.00"), "key-A")
            .await
            .unwrap();

        h.clock.advance(Duration::hours(2));
        let second = h
            .orchestrator
            .submit(transfer(12345, 56789, "200.00"), "key-A")
            .await
            .unwrap();

        assert!(second.transfer_id > first.transfer_id);
        assert_eq!(h.ledger.create_calls(), 2);
        assert_eq!(h.store.find("key-A").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_record_is_replayed_just_before_expiry() {
        let h = harness();

        let first = h
            .orchestrator
            .submit(transfer(1, 2, "5"), "key-B")
            .await
            .unwrap();

        h.clock.advance(Duration::hours(2) - Duration::seconds(1));
        let second = h
            .orchestrator
            .submit(transfer(1, 2, "5"), "key-B")
            .await
            .unwrap();

        assert_eq!(second, first);
        assert_eq!(h.ledger.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_domain_errors_are_not_cached() {
        let h = harness();
        h.ledger.set_behavior(12345, StubBehavior::InsufficientFunds);

        for _ in 0..2 {
            let err = h
                .orchestrator
                .submit(transfer(12345, 56789, "200.00"), "key-C")
                .await
                .unwrap_err();
            assert!(matches!(err, TransferError::InsufficientFunds { .. }));
        }

        assert_eq!(h.ledger.create_calls(), 2);
        assert_eq!(h.store.find("key-C").await.unwrap(), None);

        // Once the account is funded the same key goes through
        h.ledger.clear_behavior(12345);
        let record = h
            .orchestrator
            .submit(transfer(12345, 56789, "200.00"), "key-C")
            .await
            .unwrap();
        assert_eq!(record.response, "SUCCESS");
    }

    #[tokio::test]
    async fn test_account_not_found_propagates() {
        let h = harness();
        h.ledger.set_behavior(404, StubBehavior::AccountNotFound);

        let err = h
            .orchestrator
            .submit(transfer(404, 1, "1.00"), "key-D")
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::AccountNotFound { .. }));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_outcome_is_cached() {
        let h = harness();
        h.ledger.set_unavailable(true);

        let first = h
            .orchestrator
            .submit(transfer(1, 2, "50.00"), "key-E")
            .await
            .unwrap();
        assert_eq!(first.response, FALLBACK_RESPONSE);

        // Ledger recovers, but the retry still replays the recorded fallback
        h.ledger.set_unavailable(false);
        let second = h
            .orchestrator
            .submit(transfer(1, 2, "50.00"), "key-E")
            .await
            .unwrap();

        assert_eq!(second, first);
        assert_eq!(h.ledger.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_get_status_reads_store_only() {
        let h = harness();
        let record = h
            .orchestrator
            .submit(transfer(1, 2, "3.00"), "key-F")
            .await
            .unwrap();

        let status = h.orchestrator.get_status(record.transfer_id).await.unwrap();
        assert_eq!(status, Some(record));
        assert_eq!(h.orchestrator.get_status(7).await.unwrap(), None);
        assert_eq!(h.ledger.get_calls(), 0);
        assert_eq!(h.ledger.create_calls(), 1);
    }

    struct FailingStore;

    #[async_trait]
    impl IdempotencyStore for FailingStore {
        async fn find(&self, _key: &str) -> Result<Option<IdempotencyRecord>, TransferError> {
            Ok(None)
        }

        async fn find_by_transfer_id(
            &self,
            _transfer_id: TransferId,
        ) -> Result<Option<IdempotencyRecord>, TransferError> {
            Ok(None)
        }

        async fn save(
            &self,
            _record: IdempotencyRecord,
        ) -> Result<IdempotencyRecord, TransferError> {
            Err(TransferError::storage("connection lost"))
        }
    }

    #[tokio::test]
    async fn test_storage_error_is_surfaced() {
        let ledger = Arc::new(StubLedger::new());
        let orchestrator = TransferOrchestrator::new(
            Arc::new(FailingStore),
            Arc::new(LedgerClient::new(ledger.clone(), &LedgerConfig::default())),
            Arc::new(TransferIdAllocator::new()),
            Arc::new(ManualClock::default()),
            OrchestratorConfig::default(),
        );

        let err = orchestrator
            .submit(transfer(1, 2, "1.00"), "key-G")
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::storage("connection lost"));

        let results = orchestrator
            .submit_batch(vec![batch_item(1, 10)])
            .await
            .unwrap();
        assert_eq!(
            results[0].outcome,
            Err(TransferError::storage("connection lost"))
        );
    }

    #[tokio::test]
    async fn test_concurrent_same_key_submissions_are_not_deduplicated() {
        // find and save are not atomic together: both submissions miss the
        // store while the first ledger call is still in flight.
        let h = harness_with(
            StubLedger::new().with_latency(std::time::Duration::from_millis(20)),
        );

        let (a, b) = tokio::join!(
            h.orchestrator.submit(transfer(1, 2, "1.00"), "key-race"),
            h.orchestrator.submit(transfer(1, 2, "1.00"), "key-race"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(h.ledger.create_calls(), 2);
        assert_ne!(a.transfer_id, b.transfer_id);
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_isolates_item_failures() {
        let h = harness();
        h.ledger.set_behavior(2, StubBehavior::AccountNotFound);

        let results = h
            .orchestrator
            .submit_batch(vec![
                batch_item(1, 1_000_001),
                batch_item(2, 1_000_002),
                batch_item(3, 1_000_003),
            ])
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].transfer_id, 1_000_001);
        assert_eq!(
            results[0].outcome,
            Ok("Processed: 1000001, SUCCESS".to_string())
        );
        assert!(matches!(
            results[1].outcome,
            Err(TransferError::AccountNotFound {
                transfer_id: 1_000_002,
                ..
            })
        ));
        assert_eq!(
            results[2].outcome,
            Ok("Processed: 1000003, SUCCESS".to_string())
        );
        assert_eq!(h.store.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_reuses_live_records() {
        let h = harness();
        let batch = vec![batch_item(1, 500), batch_item(1, 501)];

        let first = h.orchestrator.submit_batch(batch.clone()).await.unwrap();
        let second = h.orchestrator.submit_batch(batch).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.ledger.create_calls(), 2);

        let status = h.orchestrator.get_status(500).await.unwrap().unwrap();
        assert_eq!(status.key, "batch:500");
    }

    #[tokio::test]
    async fn test_batch_and_keyed_records_do_not_collide() {
        let h = harness();

        let batch = h
            .orchestrator
            .submit_batch(vec![batch_item(1, 500)])
            .await
            .unwrap();
        assert!(batch[0].is_ok());

        // A client token spelling the batch id gets its own submission
        let keyed = h
            .orchestrator
            .submit(transfer(1, 2, "5"), "500")
            .await
            .unwrap();
        assert_eq!(keyed.transfer_id, 1_000_001);
        assert_eq!(h.ledger.create_calls(), 2);

        // A batch item reusing a keyed submission's id is not answered by it
        let results = h
            .orchestrator
            .submit_batch(vec![batch_item(1, 1_000_001)])
            .await
            .unwrap();
        assert_eq!(
            results[0].outcome,
            Ok("Processed: 1000001, SUCCESS".to_string())
        );
        assert_eq!(h.ledger.create_calls(), 3);
        assert!(h.store.find("batch:1000001").await.unwrap().is_some());
        assert!(h.store.find("500").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_batch_resubmits_after_expiry() {
        let h = harness();
        let batch = vec![batch_item(1, 600)];

        h.orchestrator.submit_batch(batch.clone()).await.unwrap();
        h.clock.advance(Duration::hours(3));
        h.orchestrator.submit_batch(batch).await.unwrap();

        assert_eq!(h.ledger.create_calls(), 2);
    }

    #[tokio::test]
    async fn test_batch_records_fallback_outcomes() {
        let h = harness();
        h.ledger.set_behavior(9, StubBehavior::Unavailable);

        let results = h
            .orchestrator
            .submit_batch(vec![batch_item(9, 700)])
            .await
            .unwrap();

        assert_eq!(
            results[0].outcome,
            Ok(format!("Processed: 700, {}", FALLBACK_RESPONSE))
        );
        let status = h.orchestrator.get_status(700).await.unwrap().unwrap();
        assert_eq!(status.response, FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn test_batch_item_without_transfer_id_fails_alone() {
        let h = harness();

        let results = h
            .orchestrator
            .submit_batch(vec![batch_item(1, 800), transfer(1, 2, "1.00")])
            .await
            .unwrap();

        assert!(results[0].is_ok());
        assert_eq!(results[1].transfer_id, 0);
        assert_eq!(
            results[1].outcome,
            Err(TransferError::MissingTransferId { index: 1 })
        );
    }

    #[tokio::test]
    async fn test_batch_size_bounds() {
        let h = harness();

        let err = h.orchestrator.submit_batch(vec![]).await.unwrap_err();
        assert_eq!(err, TransferError::InvalidBatchSize { size: 0, max: 20 });

        let oversized: Vec<_> = (0..21).map(|i| batch_item(1, 900 + i)).collect();
        let err = h.orchestrator.submit_batch(oversized).await.unwrap_err();
        assert_eq!(err, TransferError::InvalidBatchSize { size: 21, max: 20 });
        assert_eq!(h.ledger.create_calls(), 0);

        let full: Vec<_> = (0..20).map(|i| batch_item(1, 900 + i)).collect();
        let results = h.orchestrator.submit_batch(full).await.unwrap();
        assert!(results.iter().all(BatchItemResult::is_ok));
        let ids: Vec<_> = results.iter().map(|r| r.transfer_id).collect();
        assert_eq!(ids, (900..920).collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let config = OrchestratorConfig::new(Duration::zero(), 50);
        assert_eq!(config, OrchestratorConfig::default());

        let config = OrchestratorConfig::new(Duration::minutes(5), 5);
        assert_eq!(config.idempotency_ttl, Duration::minutes(5));
        assert_eq!(config.max_batch_size, 5);
    }
}
