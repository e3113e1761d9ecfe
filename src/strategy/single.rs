//! Keyed, one-at-a-time submission
//!
//! Each row goes through `TransferOrchestrator::submit` under the key in its
//! `key` column, in file order. Repeated keys in the same file behave exactly
//! like client retries: the later rows replay the first row's outcome.

use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use super::{open_reader, SubmissionStrategy};
use crate::core::TransferOrchestrator;
use crate::io::ReportWriter;
use crate::types::{SubmissionOutcome, TransferError};

/// Rows pulled from the reader per read
const READ_CHUNK: usize = 256;

#[derive(Debug, Clone, Copy, Default)]
pub struct SingleSubmissionStrategy;

#[async_trait]
impl SubmissionStrategy for SingleSubmissionStrategy {
    async fn process(
        &self,
        orchestrator: &TransferOrchestrator,
        input_path: &Path,
        output: &mut (dyn Write + Send),
    ) -> Result<(), TransferError> {
        let mut reader = open_reader(input_path).await?;
        let mut report = ReportWriter::submissions(output)?;
        let mut submitted = 0usize;

        loop {
            let rows = reader.read_batch(READ_CHUNK).await;
            if rows.is_empty() {
                break;
            }

            let mut outcomes = Vec::with_capacity(rows.len());
            for row in rows {
                let Some(key) = row.key else {
                    warn!(
                        from = row.request.from_account_id,
                        to = row.request.to_account_id,
                        "Skipping transfer without idempotency key"
                    );
                    outcomes.push(SubmissionOutcome {
                        key: String::new(),
                        result: Err(TransferError::MissingIdempotencyKey),
                    });
                    continue;
                };

                let result = orchestrator.submit(row.request, &key).await;
                if let Err(e) = &result {
                    warn!(key = %key, error = %e, "Transfer rejected");
                }
                outcomes.push(SubmissionOutcome { key, result });
            }

            submitted += outcomes.len();
            report.write_submissions(&outcomes)?;
        }

        info!(submitted, "Keyed submission finished");
        Ok(())
    }
}
