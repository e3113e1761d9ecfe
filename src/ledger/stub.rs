//! In-process ledger for tests and benchmarks
//!
//! `StubLedger` accepts every transfer unless a behaviour is registered for
//! the transfer's source account, and counts the calls it receives so tests
//! can assert how often the orchestrator reached the downstream.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use super::LedgerApi;
use crate::types::{AccountId, LedgerError, TransferId, TransferRecord, TransferRequest};

/// Scripted reaction to transfers from a given source account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubBehavior {
    /// Answer like a 404
    AccountNotFound,
    /// Answer like a 412
    InsufficientFunds,
    /// Fail at the transport level
    Unavailable,
    /// Never answer
    Hang,
}

#[derive(Debug)]
pub struct StubLedger {
    response: String,
    latency: Option<Duration>,
    unavailable: AtomicBool,
    behaviors: DashMap<AccountId, StubBehavior>,
    transfers: DashMap<TransferId, TransferRecord>,
    create_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl StubLedger {
    /// Ledger that answers `SUCCESS` to every transfer
    pub fn new() -> Self {
        Self::with_response("SUCCESS")
    }

    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            latency: None,
            unavailable: AtomicBool::new(false),
            behaviors: DashMap::new(),
            transfers: DashMap::new(),
            create_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        }
    }

    /// Delay every create call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_behavior(&self, from_account: AccountId, behavior: StubBehavior) {
        self.behaviors.insert(from_account, behavior);
    }

    pub fn clear_behavior(&self, from_account: AccountId) {
        self.behaviors.remove(&from_account);
    }

    /// Simulate a full outage (or recovery) for every account
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of create calls received, including failed ones
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of transfers the stub accepted
    pub fn accepted(&self) -> usize {
        self.transfers.len()
    }
}

impl Default for StubLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerApi for StubLedger {
    async fn create_transfer(&self, request: &TransferRequest) -> Result<String, LedgerError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("connection refused".to_string()));
        }

        let behavior = self
            .behaviors
            .get(&request.from_account_id)
            .map(|entry| *entry.value());

        match behavior {
            Some(StubBehavior::AccountNotFound) => Err(LedgerError::AccountNotFound(format!(
                "Account {} not found",
                request.from_account_id
            ))),
            Some(StubBehavior::InsufficientFunds) => Err(LedgerError::InsufficientFunds(format!(
                "Insufficient funds in account {}",
                request.from_account_id
            ))),
            Some(StubBehavior::Unavailable) => {
                Err(LedgerError::UnexpectedStatus {
                    status: 503,
                    body: "Service Unavailable".to_string(),
                })
            }
            Some(StubBehavior::Hang) => std::future::pending().await,
            None => {
                let record = TransferRecord::from(request);
                self.transfers.insert(record.transfer_id, record);
                Ok(self.response.clone())
            }
        }
    }

    async fn get_transfer(
        &self,
        transfer_id: TransferId,
    ) -> Result<Option<TransferRecord>, LedgerError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("connection refused".to_string()));
        }

        Ok(self
            .transfers
            .get(&transfer_id)
            .map(|entry| entry.value().clone()))
    }
}
