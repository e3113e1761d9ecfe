//! Core business logic module
//!
//! This module contains the transfer submission components:
//! - `traits` - Seams for idempotency storage and time
//! - `allocator` - Transfer identifier allocation
//! - `idempotency_store` - Concurrent in-memory idempotency store
//! - `clock` - System and manual clocks
//! - `orchestrator` - Idempotent single and batch submission

pub mod allocator;
pub mod clock;
pub mod idempotency_store;
pub mod orchestrator;
pub mod traits;

pub use allocator::{TransferIdAllocator, DEFAULT_ID_BASE};
pub use clock::{ManualClock, SystemClock};
pub use idempotency_store::InMemoryIdempotencyStore;
pub use orchestrator::{
    batch_key, OrchestratorConfig, TransferOrchestrator, BATCH_KEY_PREFIX, MAX_BATCH_SIZE,
};
pub use traits::{Clock, IdempotencyStore};
