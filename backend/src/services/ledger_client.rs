//! Ledger client for proof anchoring.
//!
//! A proof is anchored by embedding a short remark in a ledger transaction.
//! [`RpcLedgerClient`] talks JSON-RPC to a wallet-enabled node and carries
//! the remark in a data output:
//!
//! 1. `createrawtransaction` with a single `data` output
//! 2. `fundrawtransaction` to add inputs and change
//! 3. `signrawtransactionwithwallet`
//! 4. `sendrawtransaction`
//!
//! Inclusion is then observed by polling `gettransaction`.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::error::{AppError, Result};

/// Node error code for an unknown transaction.
const RPC_INVALID_ADDRESS_OR_KEY: i32 = -5;

/// Where a submitted transaction currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InclusionStatus {
    Pending,
    Included { block: i64 },
    Dropped(String),
}

/// Result of waiting for inclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InclusionOutcome {
    Included { block: i64 },
    Dropped(String),
    TimedOut,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a transaction carrying `remark`; returns the transaction hash.
    async fn submit_remark(&self, remark: &str) -> Result<String>;

    async fn inclusion_status(&self, tx_hash: &str) -> Result<InclusionStatus>;

    /// Network label recorded alongside anchors.
    fn network(&self) -> &str;
}

/// Poll until the transaction is included, dropped, or `timeout` elapses.
///
/// Errors while polling are logged and retried on the next tick.
pub async fn await_inclusion(
    ledger: &dyn LedgerClient,
    tx_hash: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> InclusionOutcome {
    let poll = async {
        loop {
            match ledger.inclusion_status(tx_hash).await {
                Ok(InclusionStatus::Included { block }) => {
                    return InclusionOutcome::Included { block };
                }
                Ok(InclusionStatus::Dropped(reason)) => return InclusionOutcome::Dropped(reason),
                Ok(InclusionStatus::Pending) => {}
                Err(e) => warn!(tx_hash, error = %e, "Ledger status poll failed"),
            }
            tokio::time::sleep(poll_interval).await;
        }
    };

    tokio::time::timeout(timeout, poll)
        .await
        .unwrap_or(InclusionOutcome::TimedOut)
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i32,
    message: String,
}

enum CallError {
    Node { code: i32, message: String },
    Transport(String),
}

impl From<CallError> for AppError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Node { code, message } => {
                AppError::ExternalUnavailable(format!("Ledger RPC error {}: {}", code, message))
            }
            CallError::Transport(message) => AppError::ExternalUnavailable(message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FundedTx {
    hex: String,
}

#[derive(Debug, Deserialize)]
struct SignedTx {
    hex: String,
    complete: bool,
}

#[derive(Debug, Deserialize)]
struct WalletTx {
    confirmations: i64,
    blockheight: Option<i64>,
}

/// JSON-RPC client for a wallet-enabled ledger node
pub struct RpcLedgerClient {
    client: Client,
    config: LedgerConfig,
    request_id: AtomicU64,
}

impl RpcLedgerClient {
    pub fn new(config: LedgerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(url = %config.rpc_url, network = %config.network, "Ledger client initialized");
        Ok(Self {
            client,
            config,
            request_id: AtomicU64::new(0),
        })
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<T, CallError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        debug!("Ledger RPC call: {} id={}", method, id);

        let mut builder = self.client.post(&self.config.rpc_url).json(&request);
        if let Some(user) = &self.config.rpc_user {
            let auth = format!(
                "{}:{}",
                user,
                self.config.rpc_password.as_deref().unwrap_or_default()
            );
            builder = builder.header(
                "Authorization",
                format!(
                    "Basic {}",
                    base64::engine::general_purpose::STANDARD.encode(auth)
                ),
            );
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CallError::Transport(format!("Ledger RPC unreachable: {}", e)))?;

        // Nodes answer RPC errors with a non-2xx status and a JSON body, so
        // try the body before giving up on the status.
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CallError::Transport(format!("Ledger RPC read failed: {}", e)))?;
        let rpc_response: RpcResponse<T> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(CallError::Transport(format!("HTTP {} - {}", status, body)));
            }
            Err(e) => {
                return Err(CallError::Transport(format!("Invalid RPC response: {}", e)));
            }
        };

        if let Some(error) = rpc_response.error {
            return Err(CallError::Node {
                code: error.code,
                message: error.message,
            });
        }
        rpc_response
            .result
            .ok_or_else(|| CallError::Transport("Empty RPC response".to_string()))
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn submit_remark(&self, remark: &str) -> Result<String> {
        let data = hex::encode(remark.as_bytes());
        let raw: String = self
            .call("createrawtransaction", json!([[], [{ "data": data }]]))
            .await?;
        let funded: FundedTx = self.call("fundrawtransaction", json!([raw])).await?;
        let signed: SignedTx = self
            .call("signrawtransactionwithwallet", json!([funded.hex]))
            .await?;
        if !signed.complete {
            return Err(AppError::ExternalUnavailable(
                "Ledger wallet could not fully sign the anchor transaction".to_string(),
            ));
        }
        let tx_hash: String = self.call("sendrawtransaction", json!([signed.hex])).await?;

        info!(tx_hash = %tx_hash, "Anchor transaction broadcast");
        Ok(tx_hash)
    }

    async fn inclusion_status(&self, tx_hash: &str) -> Result<InclusionStatus> {
        match self.call::<WalletTx>("gettransaction", json!([tx_hash])).await {
            Ok(tx) if tx.confirmations >= 1 => match tx.blockheight {
                Some(block) => Ok(InclusionStatus::Included { block }),
                None => Ok(InclusionStatus::Pending),
            },
            Ok(tx) if tx.confirmations < 0 => Ok(InclusionStatus::Dropped(format!(
                "transaction conflicted ({} confirmations)",
                tx.confirmations
            ))),
            Ok(_) => Ok(InclusionStatus::Pending),
            Err(CallError::Node { code, message }) if code == RPC_INVALID_ADDRESS_OR_KEY => {
                Ok(InclusionStatus::Dropped(message))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn network(&self) -> &str {
        &self.config.network
    }
}
