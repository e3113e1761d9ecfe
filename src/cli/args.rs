use crate::core::{OrchestratorConfig, DEFAULT_ID_BASE, MAX_BATCH_SIZE};
use crate::ledger::{CircuitBreakerConfig, LedgerConfig};
use crate::types::TransferId;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Submit money transfers to the ledger at most once per idempotency key
#[derive(Parser, Debug)]
#[command(name = "transfer-orchestrator")]
#[command(about = "Submit money transfers to the ledger at most once per idempotency key", long_about = None)]
pub struct CliArgs {
    /// Input CSV file with columns key,transfer_id,from,to,amount
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    #[arg(
        long = "mode",
        value_name = "MODE",
        default_value = "single",
        help = "Submission mode: 'single' (keyed, sequential) or 'batch' (by transfer id, concurrent)"
    )]
    pub mode: SubmissionMode,

    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        default_value_t = MAX_BATCH_SIZE,
        help = "Transfers per batch in batch mode (1-20)"
    )]
    pub batch_size: usize,

    #[arg(
        long = "ledger-url",
        env = "LEDGER_BASE_URL",
        value_name = "URL",
        default_value = "http://localhost:8081",
        help = "Base URL of the ledger service"
    )]
    pub ledger_url: String,

    #[arg(
        long = "ledger-transfer-path",
        env = "LEDGER_TRANSFER_PATH",
        value_name = "PATH",
        default_value = "/transfers",
        help = "Path of the ledger's transfers resource"
    )]
    pub ledger_transfer_path: String,

    #[arg(
        long = "ledger-timeout-ms",
        env = "LEDGER_TIMEOUT_MS",
        value_name = "MS",
        default_value_t = 5000,
        help = "Timeout for a single ledger call"
    )]
    pub ledger_timeout_ms: u64,

    #[arg(
        long = "idempotency-ttl-secs",
        value_name = "SECS",
        default_value_t = 7200,
        help = "How long a submitted key replays its outcome"
    )]
    pub idempotency_ttl_secs: i64,

    #[arg(
        long = "id-base",
        value_name = "ID",
        default_value_t = DEFAULT_ID_BASE,
        help = "Allocated transfer ids start right above this value"
    )]
    pub id_base: TransferId,

    #[arg(
        long = "worker-threads",
        value_name = "COUNT",
        help = "Runtime worker threads (default: CPU cores)"
    )]
    pub worker_threads: Option<usize>,

    #[arg(
        long = "log-level",
        env = "LOG_LEVEL",
        value_name = "LEVEL",
        default_value = "info",
        help = "Log filter used when RUST_LOG is not set"
    )]
    pub log_level: String,

    #[arg(long = "cb-failure-rate", value_name = "PERCENT", default_value_t = 50.0)]
    pub cb_failure_rate: f64,

    #[arg(long = "cb-window", value_name = "CALLS", default_value_t = 10)]
    pub cb_window: usize,

    #[arg(long = "cb-min-calls", value_name = "CALLS", default_value_t = 5)]
    pub cb_min_calls: usize,

    #[arg(long = "cb-open-secs", value_name = "SECS", default_value_t = 30)]
    pub cb_open_secs: u64,

    #[arg(long = "cb-half-open-calls", value_name = "CALLS", default_value_t = 3)]
    pub cb_half_open_calls: usize,
}

/// Available submission modes
#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SubmissionMode {
    Single,
    Batch,
}

impl CliArgs {
    pub fn to_orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::new(
            chrono::Duration::seconds(self.idempotency_ttl_secs),
            MAX_BATCH_SIZE,
        )
    }

    pub fn to_ledger_config(&self) -> LedgerConfig {
        let default = LedgerConfig::default();

        let call_timeout = if self.ledger_timeout_ms == 0 {
            tracing::warn!(
                "Invalid ledger_timeout_ms (0), using default ({}ms)",
                default.call_timeout.as_millis()
            );
            default.call_timeout
        } else {
            Duration::from_millis(self.ledger_timeout_ms)
        };

        LedgerConfig {
            base_url: self.ledger_url.clone(),
            transfer_path: self.ledger_transfer_path.clone(),
            call_timeout,
            circuit_breaker: CircuitBreakerConfig::new(
                self.cb_failure_rate,
                self.cb_window,
                self.cb_min_calls,
                Duration::from_secs(self.cb_open_secs),
                self.cb_half_open_calls,
            ),
        }
    }

    /// Worker threads for the runtime; zero or absent means one per CPU
    pub fn worker_threads(&self) -> usize {
        match self.worker_threads {
            Some(n) if n > 0 => n,
            _ => num_cpus::get(),
        }
    }
}
