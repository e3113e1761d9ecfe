//! Submission strategy module
//!
//! This module defines the Strategy pattern for complete submission pipelines:
//! reading transfers from CSV, pushing them through the orchestrator and
//! writing the outcomes. The mode is selected at runtime:
//!
//! - **single**: every row is submitted under its own idempotency key, in file order
//! - **batch**: rows carry pre-set transfer ids and are submitted in concurrent chunks

use async_trait::async_trait;
use std::io::Write;
use std::path::Path;

use crate::cli::SubmissionMode;
use crate::core::{TransferOrchestrator, MAX_BATCH_SIZE};
use crate::io::AsyncReader;
use crate::types::TransferError;

pub mod batch;
pub mod single;

pub use batch::BatchSubmissionStrategy;
pub use single::SingleSubmissionStrategy;

/// Submission strategy trait for complete CSV-to-CSV pipelines
#[async_trait]
pub trait SubmissionStrategy: Send + Sync {
    /// Submit every transfer in `input_path` and write the outcomes to `output`
    ///
    /// # Errors
    ///
    /// Only fatal problems: unreadable input, unwritable output, or an invalid
    /// batch. Per-transfer failures are written to the output instead.
    async fn process(
        &self,
        orchestrator: &TransferOrchestrator,
        input_path: &Path,
        output: &mut (dyn Write + Send),
    ) -> Result<(), TransferError>;
}

/// Create a submission strategy for `mode`
///
/// `batch_size` only matters for batch mode and is clamped to `1..=MAX_BATCH_SIZE`.
pub fn create_strategy(mode: SubmissionMode, batch_size: usize) -> Box<dyn SubmissionStrategy> {
    match mode {
        SubmissionMode::Single => Box::new(SingleSubmissionStrategy),
        SubmissionMode::Batch => Box::new(BatchSubmissionStrategy::new(
            batch_size.clamp(1, MAX_BATCH_SIZE),
        )),
    }
}

/// Open a CSV file as an `AsyncReader`
pub(crate) async fn open_reader(
    input_path: &Path,
) -> Result<AsyncReader<tokio_util::compat::Compat<tokio::fs::File>>, TransferError> {
    let file = tokio::fs::File::open(input_path)
        .await
        .map_err(|e| TransferError::IoError {
            message: format!("Failed to open file '{}': {}", input_path.display(), e),
        })?;

    // Wrap tokio file in a compatibility layer for csv-async
    let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);

    Ok(AsyncReader::new(compat_file))
}
