//! CSV format handling for transfer input and submission output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to transfer rows
//! - ReportWriter, streaming keyed and batch reports chunk by chunk
//!
//! All functions are pure (no file I/O) for easy testing.

use crate::types::{
    AccountId, BatchItemResult, SubmissionOutcome, TransferError, TransferId, TransferRequest,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
///
/// Matches the input CSV format with columns: key, transfer_id, from, to, amount.
/// `key` is used by single submissions, `transfer_id` by batch submissions;
/// either may be left empty when the other mode is used.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    pub key: Option<String>,
    pub transfer_id: Option<TransferId>,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: String,
}

/// A transfer read from input, with the idempotency key it came with
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRow {
    pub key: Option<String>,
    pub request: TransferRequest,
}

/// Convert a CsvRecord to a TransferRow
///
/// Parses the amount as an exact decimal and normalizes an empty key to `None`.
///
/// # Returns
///
/// * `Ok(TransferRow)` - Successfully converted record
/// * `Err(String)` - Error message describing the conversion failure
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<TransferRow, String> {
    let amount_str = csv_record.amount.trim();
    if amount_str.is_empty() {
        return Err(format!(
            "Transfer {} -> {} requires an amount",
            csv_record.from, csv_record.to
        ));
    }

    let amount = Decimal::from_str(amount_str).map_err(|_| {
        format!(
            "Invalid amount '{}' for transfer {} -> {}",
            csv_record.amount, csv_record.from, csv_record.to
        )
    })?;

    let key = csv_record
        .key
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty());

    Ok(TransferRow {
        key,
        request: TransferRequest {
            transfer_id: csv_record.transfer_id,
            from_account_id: csv_record.from,
            to_account_id: csv_record.to,
            amount,
        },
    })
}

const SUBMISSION_HEADER: [&str; 5] = ["key", "transfer_id", "response", "expiry", "error"];
const BATCH_HEADER: [&str; 3] = ["transfer_id", "outcome", "error"];

/// Incremental CSV report writer
///
/// The header goes out on creation; every `write_*` call appends rows and
/// flushes, so a report streams out chunk by chunk instead of being held in
/// memory until the input is exhausted.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    /// Report for keyed submissions: key, transfer_id, response, expiry, error
    pub fn submissions(output: W) -> Result<Self, TransferError> {
        Self::with_header(output, &SUBMISSION_HEADER)
    }

    /// Report for batch submissions: transfer_id, outcome, error
    pub fn batch_results(output: W) -> Result<Self, TransferError> {
        Self::with_header(output, &BATCH_HEADER)
    }

    fn with_header(output: W, header: &[&str]) -> Result<Self, TransferError> {
        let mut writer = csv::Writer::from_writer(output);
        writer.write_record(header)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn write_submissions(&mut self, outcomes: &[SubmissionOutcome]) -> Result<(), TransferError> {
        for outcome in outcomes {
            let row = match &outcome.result {
                Ok(record) => [
                    outcome.key.clone(),
                    record.transfer_id.to_string(),
                    record.response.clone(),
                    record.expiry.to_rfc3339(),
                    String::new(),
                ],
                Err(e) => [
                    outcome.key.clone(),
                    String::new(),
                    String::new(),
                    String::new(),
                    e.to_string(),
                ],
            };
            self.writer.write_record(&row)?;
        }

        self.writer.flush()?;
        Ok(())
    }

    pub fn write_batch_results(&mut self, results: &[BatchItemResult]) -> Result<(), TransferError> {
        for result in results {
            let (outcome, error) = match &result.outcome {
                Ok(confirmation) => (confirmation.clone(), String::new()),
                Err(e) => (String::new(), e.to_string()),
            };
            self.writer
                .write_record(&[result.transfer_id.to_string(), outcome, error])?;
        }

        self.writer.flush()?;
        Ok(())
    }
}
