//! HTTP transport to the ledger service

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info};

use super::client::LedgerConfig;
use super::LedgerApi;
use crate::types::{LedgerError, TransferError, TransferId, TransferRecord, TransferRequest};

/// reqwest-backed `LedgerApi`
///
/// - `POST {base}{path}` with the JSON request body
/// - `GET {base}{path}/{id}`
#[derive(Debug, Clone)]
pub struct HttpLedgerApi {
    client: reqwest::Client,
    transfers_url: String,
}

impl HttpLedgerApi {
    pub fn new(config: &LedgerConfig) -> Result<Self, TransferError> {
        let base = config.base_url.trim_end_matches('/');
        if base.is_empty() {
            return Err(TransferError::configuration("Ledger base URL is empty"));
        }
        let path = config.transfer_path.trim_matches('/');
        let transfers_url = format!("{}/{}", base, path);

        info!("Initializing ledger client for {}", transfers_url);

        // The ledger client enforces its own call timeout; this one bounds stuck sockets
        let client = reqwest::Client::builder()
            .timeout(config.call_timeout * 2)
            .build()
            .map_err(|e| {
                TransferError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            transfers_url,
        })
    }

    pub fn transfers_url(&self) -> &str {
        &self.transfers_url
    }
}

fn transport_error(e: reqwest::Error) -> LedgerError {
    if e.is_timeout() {
        LedgerError::Transport(format!("HTTP request timed out: {}", e))
    } else {
        LedgerError::Transport(format!("HTTP request failed: {}", e))
    }
}

#[async_trait]
impl LedgerApi for HttpLedgerApi {
    async fn create_transfer(&self, request: &TransferRequest) -> Result<String, LedgerError> {
        let response = self
            .client
            .post(&self.transfers_url)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        debug!(status = status.as_u16(), "Ledger create response");

        match status {
            s if s.is_success() => Ok(body),
            StatusCode::NOT_FOUND => Err(LedgerError::AccountNotFound(body)),
            StatusCode::PRECONDITION_FAILED => Err(LedgerError::InsufficientFunds(body)),
            s => Err(LedgerError::UnexpectedStatus {
                status: s.as_u16(),
                body,
            }),
        }
    }

    async fn get_transfer(
        &self,
        transfer_id: TransferId,
    ) -> Result<Option<TransferRecord>, LedgerError> {
        let response = self
            .client
            .get(format!("{}/{}", self.transfers_url, transfer_id))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<TransferRecord>()
            .await
            .map(Some)
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }
}
