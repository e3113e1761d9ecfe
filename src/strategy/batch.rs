//! Chunked concurrent submission
//!
//! Rows are read in chunks of `batch_size` and each chunk goes through
//! `TransferOrchestrator::submit_batch`. Chunks run one after another; items
//! inside a chunk run concurrently. Each chunk's results are written as soon
//! as the chunk completes.

use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use super::{open_reader, SubmissionStrategy};
use crate::core::{TransferOrchestrator, MAX_BATCH_SIZE};
use crate::io::ReportWriter;
use crate::types::TransferError;

#[derive(Debug, Clone)]
pub struct BatchSubmissionStrategy {
    batch_size: usize,
}

impl BatchSubmissionStrategy {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl Default for BatchSubmissionStrategy {
    fn default() -> Self {
        Self::new(MAX_BATCH_SIZE)
    }
}

#[async_trait]
impl SubmissionStrategy for BatchSubmissionStrategy {
    async fn process(
        &self,
        orchestrator: &TransferOrchestrator,
        input_path: &Path,
        output: &mut (dyn Write + Send),
    ) -> Result<(), TransferError> {
        let mut reader = open_reader(input_path).await?;
        let mut report = ReportWriter::batch_results(output)?;
        let mut batches = 0usize;
        let mut items = 0usize;
        let mut succeeded = 0usize;

        loop {
            let rows = reader.read_batch(self.batch_size).await;
            if rows.is_empty() {
                break;
            }

            batches += 1;
            debug!(batch = batches, items = rows.len(), "Submitting batch");
            let requests = rows.into_iter().map(|row| row.request).collect();
            let results = orchestrator.submit_batch(requests).await?;

            items += results.len();
            succeeded += results.iter().filter(|r| r.is_ok()).count();
            report.write_batch_results(&results)?;
        }

        info!(batches, items, succeeded, "Batch submission finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OrchestratorConfig;
    use crate::ledger::{LedgerConfig, StubBehavior, StubLedger};
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn orchestrator(ledger: Arc<StubLedger>) -> TransferOrchestrator {
        TransferOrchestrator::in_memory(
            ledger,
            &LedgerConfig::default(),
            1_000_000,
            OrchestratorConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_batch_strategy_isolates_failures_and_keeps_order() {
        let ledger = Arc::new(StubLedger::new());
        ledger.set_behavior(2, StubBehavior::AccountNotFound);
        let file = create_temp_csv(
            "key,transfer_id,from,to,amount\n\
             ,101,1,9,10.00\n\
             ,102,2,9,10.00\n\
             ,103,3,9,10.00\n",
        );

        let mut output = Vec::new();
        BatchSubmissionStrategy::default()
            .process(&orchestrator(ledger.clone()), file.path(), &mut output)
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "transfer_id,outcome,error");
        assert_eq!(lines[1], "101,\"Processed: 101, SUCCESS\",");
        assert!(lines[2].starts_with("102,,Account not found for transfer 102"));
        assert_eq!(lines[3], "103,\"Processed: 103, SUCCESS\",");
        assert_eq!(ledger.create_calls(), 3);
    }

    #[tokio::test]
    async fn test_batch_strategy_chunks_input() {
        let ledger = Arc::new(StubLedger::new());
        let rows: String = (1..=5).map(|i| format!(",{},1,2,1.00\n", i)).collect();
        let file = create_temp_csv(&format!("key,transfer_id,from,to,amount\n{}", rows));

        let mut output = Vec::new();
        BatchSubmissionStrategy::new(2)
            .process(&orchestrator(ledger.clone()), file.path(), &mut output)
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        let ids: Vec<&str> = output
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(ledger.create_calls(), 5);
    }

    #[tokio::test]
    async fn test_duplicate_transfer_ids_across_chunks_replay() {
        let ledger = Arc::new(StubLedger::new());
        let file = create_temp_csv(
            "key,transfer_id,from,to,amount\n\
             ,55,1,2,1.00\n\
             ,55,1,2,1.00\n",
        );

        let mut output = Vec::new();
        BatchSubmissionStrategy::new(1)
            .process(&orchestrator(ledger.clone()), file.path(), &mut output)
            .await
            .unwrap();

        assert_eq!(ledger.create_calls(), 1);
        let output = String::from_utf8(output).unwrap();
        assert_eq!(output.matches("Processed: 55, SUCCESS").count(), 2);
    }
}
