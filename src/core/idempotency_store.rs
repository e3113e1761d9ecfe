//! Thread-safe in-memory idempotency store
//!
//! This module provides the `InMemoryIdempotencyStore` struct, which keeps
//! idempotency records in concurrent maps so that concurrent batch tasks can
//! read and write without a global lock.
//!
//! # Design
//!
//! Two `DashMap`s are kept side by side:
//! - records by idempotency key (primary)
//! - idempotency key by transfer id (secondary index for status queries)
//!
//! Saving a record under a key that previously pointed at another transfer
//! drops the stale index entry, so the index never resolves to a record that
//! was overwritten.
//!
//! # Expiry
//!
//! The store does not interpret `expiry` on reads; callers decide whether a
//! record is still live. `purge_expired` removes stale records on demand.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use super::traits::IdempotencyStore;
use crate::types::{IdempotencyRecord, TransferError, TransferId};

/// Concurrent idempotency record store
#[derive(Debug, Default)]
pub struct InMemoryIdempotencyStore {
    /// Records keyed by idempotency token
    records: DashMap<String, IdempotencyRecord>,

    /// Transfer id to idempotency token
    by_transfer_id: DashMap<TransferId, String>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, live or expired
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record whose expiry is at or before `now`
    ///
    /// Returns how many records were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<(String, TransferId)> = self
            .records
            .iter()
            .filter(|entry| !entry.value().is_live(now))
            .map(|entry| (entry.key().clone(), entry.value().transfer_id))
            .collect();

        let mut removed = 0;
        for (key, transfer_id) in expired {
            // Re-check under the shard lock; the key may have been rewritten meanwhile
            if self
                .records
                .remove_if(&key, |_, record| !record.is_live(now))
                .is_some()
            {
                self.by_transfer_id
                    .remove_if(&transfer_id, |_, indexed_key| *indexed_key == key);
                removed += 1;
            }
        }

        debug!(removed, "Purged expired idempotency records");
        removed
    }

    fn insert(&self, record: IdempotencyRecord) -> IdempotencyRecord {
        let key = record.key.clone();
        let transfer_id = record.transfer_id;

        let previous = self.records.insert(key.clone(), record.clone());
        if let Some(previous) = previous {
            if previous.transfer_id != transfer_id {
                self.by_transfer_id
                    .remove_if(&previous.transfer_id, |_, indexed_key| *indexed_key == key);
            }
        }
        self.by_transfer_id.insert(transfer_id, key);

        record
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn find(&self, key: &str) -> Result<Option<IdempotencyRecord>, TransferError> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn find_by_transfer_id(
        &self,
        transfer_id: TransferId,
    ) -> Result<Option<IdempotencyRecord>, TransferError> {
        let Some(key) = self
            .by_transfer_id
            .get(&transfer_id)
            .map(|entry| entry.value().clone())
        else {
            return Ok(None);
        };

        Ok(self
            .records
            .get(&key)
            .map(|entry| entry.value().clone())
            .filter(|record| record.transfer_id == transfer_id))
    }

    async fn save(&self, record: IdempotencyRecord) -> Result<IdempotencyRecord, TransferError> {
        Ok(self.insert(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    fn record(key: &str, transfer_id: TransferId, expiry: DateTime<Utc>) -> IdempotencyRecord {
        IdempotencyRecord::new(key, transfer_id, "SUCCESS", expiry)
    }

    #[tokio::test]
    async fn test_find_missing_key_is_none() {
        let store = InMemoryIdempotencyStore::new();
        assert_eq!(store.find("absent").await.unwrap(), None);
        assert_eq!(store.find_by_transfer_id(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_find_by_key_and_transfer_id() {
        let store = InMemoryIdempotencyStore::new();
        let saved = store
            .save(record("key-A", 1_000_001, noon()))
            .await
            .unwrap();

        assert_eq!(store.find("key-A").await.unwrap(), Some(saved.clone()));
        assert_eq!(
            store.find_by_transfer_id(1_000_001).await.unwrap(),
            Some(saved)
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_find_returns_expired_records() {
        let store = InMemoryIdempotencyStore::new();
        let expired = record("key-A", 1_000_001, noon() - Duration::hours(3));
        store.save(expired.clone()).await.unwrap();

        assert_eq!(store.find("key-A").await.unwrap(), Some(expired));
    }

    #[tokio::test]
    async fn test_overwrite_moves_transfer_id_index() {
        let store = InMemoryIdempotencyStore::new();
        store
            .save(record("key-A", 1_000_001, noon() - Duration::hours(1)))
            .await
            .unwrap();
        store
            .save(record("key-A", 1_000_002, noon() + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(store.find_by_transfer_id(1_000_001).await.unwrap(), None);
        let current = store.find_by_transfer_id(1_000_002).await.unwrap().unwrap();
        assert_eq!(current.key, "key-A");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_purge_expired_keeps_live_records() {
        let store = InMemoryIdempotencyStore::new();
        store.insert(record("old", 1, noon() - Duration::minutes(1)));
        store.insert(record("boundary", 2, noon()));
        store.insert(record("fresh", 3, noon() + Duration::minutes(1)));

        assert_eq!(store.purge_expired(noon()), 2);
        assert_eq!(store.len(), 1);
        assert!(store.records.contains_key("fresh"));
        assert!(!store.by_transfer_id.contains_key(&1));
        assert!(!store.by_transfer_id.contains_key(&2));
    }

    #[tokio::test]
    async fn test_concurrent_saves_for_different_keys() {
        let store = Arc::new(InMemoryIdempotencyStore::new());

        let mut handles = vec![];
        for i in 0u64..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .save(record(&format!("key-{}", i), 1_000_000 + i, noon()))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), 16);
        for i in 0u64..16 {
            let found = store.find_by_transfer_id(1_000_000 + i).await.unwrap();
            assert_eq!(found.unwrap().key, format!("key-{}", i));
        }
    }
}
