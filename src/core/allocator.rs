//! Transfer identifier allocation
//!
//! Identifiers start above a fixed base offset so they never collide with
//! identifiers that already exist in the downstream ledger.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::TransferId;

/// Base offset for allocated identifiers; the first one handed out is `base + 1`
pub const DEFAULT_ID_BASE: TransferId = 1_000_000;

/// Lock-free, strictly increasing identifier source
///
/// Safe to share across concurrent batch tasks. Every call returns a value
/// no other call has returned. Gaps are allowed.
#[derive(Debug)]
pub struct TransferIdAllocator {
    base: TransferId,
    last: AtomicU64,
}

impl TransferIdAllocator {
    pub fn new() -> Self {
        Self::with_base(DEFAULT_ID_BASE)
    }

    pub fn with_base(base: TransferId) -> Self {
        Self {
            base,
            last: AtomicU64::new(base),
        }
    }

    /// Allocate the next identifier
    pub fn next(&self) -> TransferId {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn base(&self) -> TransferId {
        self.base
    }
}

impl Default for TransferIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
