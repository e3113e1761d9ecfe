//! Transfer Orchestrator CLI
//!
//! Command-line interface for submitting transfers from CSV files to a ledger.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- transfers.csv > report.csv
//! cargo run -- --mode single --ledger-url http://ledger:8081 transfers.csv > report.csv
//! cargo run -- --mode batch --batch-size 10 transfers.csv > report.csv
//! ```
//!
//! The program reads transfer rows from the input CSV file, submits them through
//! the orchestrator using the selected mode, and writes one report row per input
//! row to stdout. Logs go to stderr.
//!
//! # Submission Modes
//!
//! - **single**: every row is submitted under its `key` column (default)
//! - **batch**: rows carry a `transfer_id` and are submitted in concurrent chunks
//!
//! # Exit Codes
//!
//! - 0: Success (per-transfer rejections are reported, not fatal)
//! - 1: Error (missing arguments, unreadable file, invalid ledger URL, etc.)

use std::process;
use std::sync::Arc;

use tracing::error;
use transfer_orchestrator::cli;
use transfer_orchestrator::core::TransferOrchestrator;
use transfer_orchestrator::ledger::HttpLedgerApi;
use transfer_orchestrator::logging;
use transfer_orchestrator::strategy;
use transfer_orchestrator::types::TransferError;

fn main() {
    // Parse command-line arguments using clap
    let args = cli::parse_args();
    logging::init_logging(&args.log_level);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(args.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create tokio runtime");
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(&args)) {
        error!(error = %e, "Submission failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: &cli::CliArgs) -> Result<(), TransferError> {
    let ledger_config = args.to_ledger_config();
    let api = Arc::new(HttpLedgerApi::new(&ledger_config)?);

    let orchestrator = TransferOrchestrator::in_memory(
        api,
        &ledger_config,
        args.id_base,
        args.to_orchestrator_config(),
    );

    let strategy = strategy::create_strategy(args.mode.clone(), args.batch_size);

    // Output goes to stdout
    let mut output = std::io::stdout();
    strategy
        .process(&orchestrator, &args.input_file, &mut output)
        .await
}
